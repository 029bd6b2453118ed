use serde::{Deserialize, Serialize};

/// A single CVE record as surfaced by the NVD feed, trimmed to the fields
/// `formatCVEData` in `original_source/cve.go` actually renders. The full
/// nested NVD JSON shape (CVSSv2/v3 sub-objects, reference tag lists) is an
/// external-collaborator concern (spec §1); this repo keeps just enough to
/// produce a useful alert line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CveItem {
    pub id: String,
    pub description: String,
    pub cvss_v3_vector: Option<String>,
    pub cvss_v3_exploitability: Option<f64>,
    pub cvss_v3_impact: Option<f64>,
    pub published_date: String,
    pub last_modified_date: String,
    pub references: Vec<String>,
}

/// Minimal shape of the raw NVD "recent CVEs" JSON feed, just enough to
/// populate [`CveItem`].
#[derive(Debug, Deserialize)]
pub(crate) struct NvdFeed {
    #[serde(rename = "CVE_Items")]
    pub cve_items: Vec<NvdCveItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NvdCveItem {
    pub cve: NvdCve,
    pub impact: Option<NvdImpact>,
    #[serde(default)]
    pub published_date: String,
    #[serde(default, rename = "lastModifiedDate")]
    pub last_modified_date: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NvdCve {
    #[serde(rename = "CVE_data_meta")]
    pub data_meta: NvdCveMeta,
    pub description: NvdDescription,
    pub references: Option<NvdReferences>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NvdCveMeta {
    #[serde(rename = "ID")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NvdDescription {
    pub description_data: Vec<NvdDescriptionDatum>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NvdDescriptionDatum {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NvdReferences {
    pub reference_data: Vec<NvdReferenceDatum>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NvdReferenceDatum {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NvdImpact {
    pub base_metric_v3: Option<NvdBaseMetricV3>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NvdBaseMetricV3 {
    pub cvss_v3: Option<NvdCvssV3>,
    pub exploitability_score: Option<f64>,
    pub impact_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NvdCvssV3 {
    pub vector_string: Option<String>,
}
