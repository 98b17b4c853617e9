// Application layer: use cases wiring the pipeline stages to the feed and
// store boundaries.

pub mod ports;
pub mod report_use_case;
pub mod transform_use_case;
