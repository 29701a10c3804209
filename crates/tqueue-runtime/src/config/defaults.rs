//! Compile-time defaults, generated by build.rs (see `TQ_CONFIG_RS`)

include!(concat!(env!("OUT_DIR"), "/tq_merged_config.rs"));
