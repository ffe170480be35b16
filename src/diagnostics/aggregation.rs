use serde::Serialize;

/// Counters of one aggregation pass over a new viewpoint.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationReport {
    pub viewpoint: usize,
    pub observations: usize,
    /// Observations without any raw match.
    pub unmatched: usize,
    /// New structures seeded.
    pub created: usize,
    /// Observations merged into an existing structure.
    pub aggregated: usize,
    /// Observations whose single candidate structure had too little support.
    pub weak_skipped: usize,
    /// Observations matching two or more structures, dropped.
    pub fused_skipped: usize,
    /// Features linked to a structure, new and prior alike.
    pub attached_features: usize,
    /// Features refused because their viewpoint was already represented.
    pub rejected_duplicates: usize,
    pub elapsed_ms: f64,
}
