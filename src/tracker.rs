// Copyright 2024 SAP SE
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use anyhow::anyhow;
use tracing::{error, info};

use crate::api_clients::Client;
use crate::projects::Project;
use crate::repo::Publisher;
use crate::report;
use crate::stats::{DownloadRecord, StatsStore};

pub struct Tracker<C: Client, P: Publisher> {
    pub projects: Vec<Project>,
    pub client: C,
    pub store: StatsStore,
    /// Set when running under automation, the stats file is then committed and pushed.
    pub publisher: Option<P>,
    /// Job summary file of the current GitHub Actions step.
    pub step_summary: Option<PathBuf>,
}

impl<C: Client, P: Publisher> Tracker<C, P> {
    /// Fetches every project's download count, stores the successful ones and publishes them.
    ///
    /// A failing project does not stop the others. All failures are reported together once the run is over.
    pub async fn run(&self, date: &str) -> Result<Vec<DownloadRecord>, anyhow::Error> {
        let mut records = Vec::new();
        let mut errors = Vec::new();

        for project in &self.projects {
            info!("Processing {project}");
            match self.client.pull_count(project).await {
                Ok(downloads) => {
                    let record = DownloadRecord {
                        project: project.clone(),
                        downloads,
                    };
                    report::print_downloads(&record);
                    records.push(record);
                },
                Err(e) => {
                    let message = format!("Error processing {project}: {e:#}");
                    error!("{message}");
                    errors.push(message);
                },
            }
        }

        if !records.is_empty() {
            let csv_file = self.store.append(date, &records)?;
            if let Some(step_summary) = &self.step_summary {
                if let Err(e) = report::write_step_summary(step_summary, date, &records) {
                    let message = format!("Failed to write job summary: {e:#}");
                    error!("{message}");
                    errors.push(message);
                }
            }

            if let Some(publisher) = &self.publisher {
                if let Err(e) = publisher.publish(csv_file, date).await {
                    let message = format!("Failed to commit changes: {e:#}");
                    error!("{message}");
                    errors.push(message);
                }
            }
        }

        if !errors.is_empty() {
            return Err(anyhow!(errors.join("\n")));
        }

        info!("Script completed successfully");
        Ok(records)
    }
}
