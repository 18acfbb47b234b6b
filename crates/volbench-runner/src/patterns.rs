//! Benchmark pattern registry.
//!
//! Each pattern pairs a fio job-file template with its display metadata and
//! expected duration. Templates carry `${TARGET_PATH}` and `${SIZE}`
//! placeholders that are substituted with already-validated values right
//! before launch; user input never reaches a shell.

use std::path::Path;
use std::time::Duration;
use volbench_common::PatternId;

/// One entry in the fixed pattern registry.
pub struct PatternSpec {
    pub id: PatternId,
    pub label: &'static str,
    /// Expected wall-clock duration, used for progress display and to size
    /// the execution ceiling. Not itself a hard limit.
    pub estimated_duration: Duration,
    job_template: &'static str,
}

const QUICK_TEMPLATE: &str = "\
[global]
directory=${TARGET_PATH}
size=${SIZE}g
direct=1
ioengine=posixaio
bs=1m
iodepth=4
runtime=30
time_based
group_reporting

[seq-write]
rw=write

[seq-read]
stonewall
rw=read
";

const STREAM_1_TEMPLATE: &str = "\
[global]
directory=${TARGET_PATH}
size=${SIZE}g
direct=1
ioengine=posixaio
bs=4m
iodepth=2
runtime=120
time_based
group_reporting

[stream-write]
rw=write

[stream-read]
stonewall
rw=read
";

const STREAM_4_TEMPLATE: &str = "\
[global]
directory=${TARGET_PATH}
size=${SIZE}g
direct=1
ioengine=posixaio
bs=4m
iodepth=2
numjobs=4
runtime=180
time_based
group_reporting

[stream-write]
rw=write

[stream-read]
stonewall
rw=read
";

const STREAM_8_TEMPLATE: &str = "\
[global]
directory=${TARGET_PATH}
size=${SIZE}g
direct=1
ioengine=posixaio
bs=4m
iodepth=2
numjobs=8
runtime=240
time_based
group_reporting

[stream-write]
rw=write

[stream-read]
stonewall
rw=read
";

const ENDURANCE_TEMPLATE: &str = "\
[global]
directory=${TARGET_PATH}
size=${SIZE}g
direct=1
ioengine=posixaio
bs=4m
iodepth=2
numjobs=2
runtime=840
time_based
group_reporting

[stream-write]
rw=write

[stream-read]
stonewall
rw=read
";

const REGISTRY: &[PatternSpec] = &[
    PatternSpec {
        id: PatternId::Quick,
        label: "Quick check (single stream)",
        estimated_duration: Duration::from_secs(60),
        job_template: QUICK_TEMPLATE,
    },
    PatternSpec {
        id: PatternId::Stream1,
        label: "One 4K stream",
        estimated_duration: Duration::from_secs(240),
        job_template: STREAM_1_TEMPLATE,
    },
    PatternSpec {
        id: PatternId::Stream4,
        label: "Four 4K streams",
        estimated_duration: Duration::from_secs(360),
        job_template: STREAM_4_TEMPLATE,
    },
    PatternSpec {
        id: PatternId::Stream8,
        label: "Eight 4K streams",
        estimated_duration: Duration::from_secs(480),
        job_template: STREAM_8_TEMPLATE,
    },
    PatternSpec {
        id: PatternId::Endurance,
        label: "Endurance (two streams, sustained)",
        estimated_duration: Duration::from_secs(1680),
        job_template: ENDURANCE_TEMPLATE,
    },
];

impl PatternSpec {
    /// The full fixed registry, in display order.
    pub fn all() -> &'static [PatternSpec] {
        REGISTRY
    }

    /// Look up the spec for a canonical pattern id.
    pub fn for_pattern(id: PatternId) -> &'static PatternSpec {
        // The registry is total over the closed enum.
        REGISTRY
            .iter()
            .find(|spec| spec.id == id)
            .unwrap_or(&REGISTRY[0])
    }

    /// Substitute the template placeholders with validated values.
    pub fn render_job_file(&self, target_path: &Path, size_gb: u32) -> String {
        self.job_template
            .replace("${TARGET_PATH}", &target_path.display().to_string())
            .replace("${SIZE}", &size_gb.to_string())
    }
}
