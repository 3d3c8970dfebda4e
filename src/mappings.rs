/// One externally reported metric derived from a meter statistic.
#[derive(Debug, Clone)]
pub struct MappingEntry {
    pub reported_name: &'static str,
    pub source_field: &'static str,
    pub accumulate: bool,
}

/// A source meter and the metrics reported from its statistics.
#[derive(Debug, Clone)]
pub struct MetricGroup {
    pub meter: &'static str,
    pub entries: Vec<MappingEntry>,
}

fn entry(reported_name: &'static str, source_field: &'static str, accumulate: bool) -> MappingEntry {
    MappingEntry {
        reported_name,
        source_field,
        accumulate,
    }
}

fn group(meter: &'static str, entries: Vec<MappingEntry>) -> MetricGroup {
    MetricGroup { meter, entries }
}

/// The meters the agent polls and their output mappings.
///
/// Reported names must be globally unique; they double as accumulator keys.
pub fn default_groups() -> Vec<MetricGroup> {
    vec![
        group(
            "cpu_util",
            vec![
                entry("OS_CPUUTIL_AVG", "avg", false),
                entry("OS_CPUUTIL_SUM", "sum", false),
                entry("OS_CPUUTIL_MIN", "min", false),
                entry("OS_CPUUTIL_MAX", "max", false),
            ],
        ),
        group(
            "cpu",
            vec![
                entry("OS_CPU_AVG", "avg", false),
                entry("OS_CPU_SUM", "sum", false),
            ],
        ),
        group("instance", vec![entry("OS_INSTANCE_SUM", "sum", false)]),
        group("memory", vec![entry("OS_MEMORY_SUM", "sum", false)]),
        group(
            "memory.usage",
            vec![entry("OS_MEMORY_USAGE_SUM", "sum", false)],
        ),
        group("volume", vec![entry("OS_VOLUME_SUM", "sum", false)]),
        group("image", vec![entry("OS_IMAGE_SUM", "sum", false)]),
        group(
            "image.size",
            vec![
                entry("OS_IMAGE_SIZE_SUM", "sum", false),
                entry("OS_IMAGE_SIZE_AVG", "avg", false),
            ],
        ),
        group(
            "disk.read.bytes.rate",
            vec![
                entry("OS_DISK_READ_RATE_SUM", "sum", false),
                entry("OS_DISK_READ_RATE_AVG", "avg", false),
            ],
        ),
        group(
            "disk.write.bytes.rate",
            vec![
                entry("OS_DISK_WRITE_RATE_SUM", "sum", false),
                entry("OS_DISK_WRITE_RATE_AVG", "avg", false),
            ],
        ),
        group(
            "network.incoming.bytes.rate",
            vec![
                entry("OS_NETWORK_IN_BYTES_SUM", "sum", false),
                entry("OS_NETWORK_IN_BYTES_AVG", "avg", false),
            ],
        ),
        group(
            "network.outgoing.bytes.rate",
            vec![
                entry("OS_NETWORK_OUT_BYTES_SUM", "sum", false),
                entry("OS_NETWORK_OUT_BYTES_AVG", "avg", false),
            ],
        ),
    ]
}
