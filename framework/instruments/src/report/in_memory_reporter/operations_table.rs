use tabled::Tabled;

#[derive(Tabled)]
pub struct OperationRow {
    pub operation_id: String,
    #[tabled(display = "float2")]
    pub avg_time_ms: f64,
    #[tabled(display = "float2")]
    pub min_time_ms: f64,
    #[tabled(display = "float2")]
    pub max_time_ms: f64,
    pub total_operations: u64,
    pub failed_operations: u64,
    #[tabled(display = "float2")]
    pub total_duration_ms: f64,
}

#[derive(Tabled)]
pub struct MetricRow {
    pub metric: String,
    pub samples: u64,
    #[tabled(display = "float3")]
    pub mean: f64,
    #[tabled(display = "float3")]
    pub min: f64,
    #[tabled(display = "float3")]
    pub max: f64,
    #[tabled(display = "float3")]
    pub last: f64,
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}

fn float3(n: &f64) -> String {
    format!("{:.3}", n)
}
