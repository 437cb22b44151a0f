/// Recommended error type for scenario code and for any tool that drives a benchmark. This type
/// is compatible with the [crate::definition::HookResult] type so you can use `?` to propagate
/// errors.
pub type BenchResult<T> = anyhow::Result<T>;
