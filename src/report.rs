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

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::Context;

use crate::stats::DownloadRecord;

pub fn print_downloads(record: &DownloadRecord) {
    println!("\nDocker Hub Statistics for {}", record.project);
    println!("Current Downloads: {}", format_thousands(record.downloads));
}

/// Appends a markdown table of the collected counts to a GitHub Actions job summary file.
pub fn write_step_summary(path: &Path, date: &str, records: &[DownloadRecord]) -> Result<(), anyhow::Error> {
    if records.is_empty() {
        return Ok(());
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot write to $GITHUB_STEP_SUMMARY {}", path.display()))?;
    file.write_all(summary_table(date, records).as_bytes())
        .with_context(|| format!("cannot write to $GITHUB_STEP_SUMMARY {}", path.display()))?;
    Ok(())
}

fn summary_table(date: &str, records: &[DownloadRecord]) -> String {
    let mut table = format!("### Docker Hub downloads on {date}\n\n");
    table.push_str("| Repository | Downloads |\n");
    table.push_str("|------------|----------:|\n");
    for record in records {
        table.push_str(&format!(
            "| [{0}](https://hub.docker.com/r/{0}) | {1} |\n",
            record.project,
            format_thousands(record.downloads)
        ));
    }
    table
}

pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, digit) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(digit);
    }
    formatted
}
