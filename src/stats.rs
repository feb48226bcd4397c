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

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

use crate::projects::Project;

pub const CSV_FILE_NAME: &str = "docker_downloads.csv";
const CSV_HEADER: &str = "Date,Repository,Downloads";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRecord {
    pub project: Project,
    pub downloads: u64,
}

/// Append-only CSV history of download counts, shared by all tracked repositories.
#[derive(Debug)]
pub struct StatsStore {
    csv_file: PathBuf,
}

impl StatsStore {
    pub fn new(stats_dir: &Path) -> Self {
        Self {
            csv_file: stats_dir.join(CSV_FILE_NAME),
        }
    }

    pub fn append(&self, date: &str, records: &[DownloadRecord]) -> Result<&Path, anyhow::Error> {
        if let Some(stats_dir) = self.csv_file.parent() {
            fs::create_dir_all(stats_dir).with_context(|| format!("cannot create directory {}", stats_dir.display()))?;
        }

        let mut contents = String::new();
        let line_end = if self.csv_file.exists() {
            let history = fs::read_to_string(&self.csv_file)
                .with_context(|| format!("cannot read {}", self.csv_file.display()))?;
            let line_end = line_ending_of(&history);
            if !history.is_empty() && !history.ends_with('\n') {
                contents.push_str(line_end);
            }
            line_end
        } else {
            contents.push_str(CSV_HEADER);
            contents.push('\n');
            info!("Created new CSV file for tracking downloads");
            "\n"
        };
        for record in records {
            contents.push_str(&format!("{date},{},{}{line_end}", record.project, record.downloads));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.csv_file)
            .with_context(|| format!("cannot open {}", self.csv_file.display()))?;
        file.write_all(contents.as_bytes())
            .with_context(|| format!("cannot write to {}", self.csv_file.display()))?;

        info!("Stored download counts for {} repositories", records.len());
        Ok(&self.csv_file)
    }
}

/// Rows keep the terminator of the existing history, which may have been written with `\r\n`.
fn line_ending_of(history: &str) -> &'static str {
    match history.find('\n') {
        Some(idx) if history[..idx].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}
