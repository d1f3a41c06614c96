//! Ambient observability: metrics emission for the monitoring-sink
//! collaborator named in the external interfaces section.

pub mod metrics;
