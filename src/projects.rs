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

use std::fmt;

use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};

/// A Docker Hub image to track, identified by its namespace and name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub repository: String,
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.username, self.repository)
    }
}

/// Parses the JSON array found in `DOCKER_PROJECTS`.
///
/// Every problem with the list is reported here, so that a broken configuration never reaches the network.
pub fn parse(projects_json: &str) -> Result<Vec<Project>, anyhow::Error> {
    if projects_json.trim().is_empty() {
        bail!("DOCKER_PROJECTS environment variable is not set");
    }

    let entries: Vec<serde_json::Value> =
        serde_json::from_str(projects_json).map_err(|e| anyhow!("Invalid JSON in DOCKER_PROJECTS: {e}"))?;
    if entries.is_empty() {
        bail!("No projects defined in DOCKER_PROJECTS");
    }

    let mut projects = Vec::with_capacity(entries.len());
    for entry in entries {
        let project = match serde_json::from_value::<Project>(entry.clone()) {
            Ok(project) if !project.username.is_empty() && !project.repository.is_empty() => project,
            _ => bail!("Invalid project configuration: {entry}"),
        };
        projects.push(project);
    }

    Ok(projects)
}
