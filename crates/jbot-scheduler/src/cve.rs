use std::collections::HashMap;
use std::io::Read;

use flate2::read::GzDecoder;
use tracing::{debug, warn};

use crate::error::{Result, SchedulerError};
use crate::types::{CveItem, NvdFeed};

/// NVD's "recent CVEs" feed, gzip-compressed JSON. Matches the URL used by
/// `original_source/cve.go`'s `URLS["cvefeed"]`.
pub const CVE_FEED_URL: &str = "https://nvd.nist.gov/feeds/json/cve/1.0/nvdcve-1.0-recent.json.gz";

/// Cap on individual CVE messages sent in one alert firing before the rest
/// collapse into a single continuation notice (`original_source/cve.go::MAX_NEW_CVES`).
pub const MAX_NEW_CVES: usize = 30;

/// Fetch and gzip-decompress the NVD feed, returning every CVE it contains
/// keyed by id. Mirrors `original_source/cve.go::updateCVEData`.
pub async fn fetch_cve_feed(client: &reqwest::Client) -> Result<HashMap<String, CveItem>> {
    let bytes = client
        .get(CVE_FEED_URL)
        .send()
        .await
        .map_err(|e| SchedulerError::CveFeedFetch(e.to_string()))?
        .bytes()
        .await
        .map_err(|e| SchedulerError::CveFeedFetch(e.to_string()))?;

    let mut decoder = GzDecoder::new(&bytes[..]);
    let mut json = String::new();
    decoder
        .read_to_string(&mut json)
        .map_err(|e| SchedulerError::CveFeedDecode(e.to_string()))?;

    let feed: NvdFeed =
        serde_json::from_str(&json).map_err(|e| SchedulerError::CveFeedDecode(e.to_string()))?;

    let mut out = HashMap::new();
    for item in feed.cve_items {
        let id = item.cve.data_meta.id.clone();
        let description = item
            .cve
            .description
            .description_data
            .into_iter()
            .map(|d| d.value)
            .collect::<Vec<_>>()
            .join(" ");
        let references = item
            .cve
            .references
            .map(|r| r.reference_data.into_iter().map(|d| d.url).collect())
            .unwrap_or_default();
        let base_metric_v3 = item.impact.and_then(|i| i.base_metric_v3);
        let cvss_v3_vector = base_metric_v3
            .as_ref()
            .and_then(|m| m.cvss_v3.as_ref())
            .and_then(|c| c.vector_string.clone());
        let cvss_v3_exploitability = base_metric_v3.as_ref().and_then(|m| m.exploitability_score);
        let cvss_v3_impact = base_metric_v3.as_ref().and_then(|m| m.impact_score);

        out.insert(
            id.clone(),
            CveItem {
                id,
                description,
                cvss_v3_vector,
                cvss_v3_exploitability,
                cvss_v3_impact,
                published_date: item.published_date,
                last_modified_date: item.last_modified_date,
                references,
            },
        );
    }
    debug!(count = out.len(), "parsed NVD CVE feed");
    Ok(out)
}

/// Render one CVE the way `!cve` and the `cve-alert` job present it
/// (`original_source/cve.go::formatCVEData`, trimmed to the fields this repo
/// keeps).
pub fn format_cve(cve: &CveItem) -> String {
    let mut msg = format!(
        "https://cve.mitre.org/cgi-bin/cvename.cgi?name={}\n{}\n",
        cve.id, cve.description
    );
    if let Some(vector) = &cve.cvss_v3_vector {
        msg.push_str(&format!("CVSSv3: {vector}\n"));
    }
    if let (Some(ex), Some(im)) = (cve.cvss_v3_exploitability, cve.cvss_v3_impact) {
        msg.push_str(&format!("Exploitability Score: {ex:.1}  Impact Score: {im:.1}\n"));
    }
    msg.push_str(&format!(
        "Published: {}  Last Modified: {}\n",
        cve.published_date, cve.last_modified_date
    ));
    if !cve.references.is_empty() {
        msg.push_str("References:\n");
        for r in &cve.references {
            msg.push_str(r);
            msg.push('\n');
        }
    }
    msg
}

/// Bundle the (possibly truncated) set of messages a `cve-alert` firing
/// should send for the CVEs not yet in `seen`, updating `seen` in place.
/// Caps individual messages at [`MAX_NEW_CVES`] and collapses the remainder
/// into a single continuation notice, per `original_source/cve.go::cveAlert`.
pub fn build_cve_alert_messages(
    all_cves: &HashMap<String, CveItem>,
    seen: &mut std::collections::HashSet<String>,
) -> Vec<String> {
    let mut new_ids: Vec<&String> = all_cves.keys().filter(|id| !seen.contains(*id)).collect();
    new_ids.sort();

    if new_ids.is_empty() {
        return Vec::new();
    }

    let mut messages = Vec::new();
    let mut truncated = false;
    for (i, id) in new_ids.iter().enumerate() {
        seen.insert((*id).clone());
        if i >= MAX_NEW_CVES {
            if !truncated {
                messages.push("...\n".to_string());
                truncated = true;
                warn!(total = new_ids.len(), "cve-alert truncating after MAX_NEW_CVES");
            }
            continue;
        }
        if let Some(cve) = all_cves.get(*id) {
            messages.push(format_cve(cve));
        }
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str) -> CveItem {
        CveItem {
            id: id.to_string(),
            description: "a vuln".to_string(),
            cvss_v3_vector: None,
            cvss_v3_exploitability: None,
            cvss_v3_impact: None,
            published_date: "2024-01-01".to_string(),
            last_modified_date: "2024-01-02".to_string(),
            references: vec![],
        }
    }

    #[test]
    fn new_cve_is_surfaced_once() {
        let mut all = HashMap::new();
        all.insert("CVE-2024-0001".to_string(), sample("CVE-2024-0001"));
        let mut seen = std::collections::HashSet::new();

        let first = build_cve_alert_messages(&all, &mut seen);
        assert_eq!(first.len(), 1);
        assert!(first[0].contains("CVE-2024-0001"));
        assert!(seen.contains("CVE-2024-0001"));

        let second = build_cve_alert_messages(&all, &mut seen);
        assert!(second.is_empty());
    }

    #[test]
    fn more_than_cap_collapses_to_continuation_notice() {
        let mut all = HashMap::new();
        for i in 0..(MAX_NEW_CVES + 5) {
            let id = format!("CVE-2024-{i:04}");
            all.insert(id.clone(), sample(&id));
        }
        let mut seen = std::collections::HashSet::new();
        let messages = build_cve_alert_messages(&all, &mut seen);
        // MAX_NEW_CVES individual messages + one continuation notice.
        assert_eq!(messages.len(), MAX_NEW_CVES + 1);
        assert_eq!(seen.len(), MAX_NEW_CVES + 5);
    }
}
