//! Sample Sets
//!
//! A resolved, analysis-friendly view of a pprof profile: every sample's
//! stack is expanded to function names (leaf first) and paired with its
//! value vector. Names are kept raw here; the analyzer normalizes them.

use crate::error::AnalysisError;
use crate::proto;
use flate2::read::GzDecoder;
use fxhash::FxHashMap;
use prost::Message;
use std::io::Read;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// What one slot of every value vector measures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueType {
    /// Stream name, e.g. `cpu`, `alloc_space`, `inuse_space`
    pub kind: String,
    /// Unit, e.g. `nanoseconds`, `bytes`, `count`
    pub unit: String,
}

impl ValueType {
    /// Build a value type from its name and unit
    pub fn new(kind: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            unit: unit.into(),
        }
    }
}

/// One weighted call-stack observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSample {
    /// Function names, leaf first
    pub frames: Vec<String>,
    /// One value per declared sample type
    pub values: Vec<i64>,
}

impl StackSample {
    /// Build a sample from a leaf-first stack
    pub fn new<S: Into<String>>(frames: impl IntoIterator<Item = S>, values: Vec<i64>) -> Self {
        Self {
            frames: frames.into_iter().map(Into::into).collect(),
            values,
        }
    }
}

/// Ordered samples plus the side table describing their value slots.
///
/// Invariant: every sample has exactly `sample_types.len()` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSet {
    sample_types: Vec<ValueType>,
    samples: Vec<StackSample>,
}

impl SampleSet {
    /// Validate and build a sample set
    pub fn new(
        sample_types: Vec<ValueType>,
        samples: Vec<StackSample>,
    ) -> Result<Self, AnalysisError> {
        for (index, sample) in samples.iter().enumerate() {
            if sample.values.len() != sample_types.len() {
                return Err(AnalysisError::ValueCountMismatch {
                    index,
                    expected: sample_types.len(),
                    got: sample.values.len(),
                });
            }
        }
        Ok(Self {
            sample_types,
            samples,
        })
    }

    /// Decode a pprof profile, gzip-compressed or raw
    pub fn decode(bytes: &[u8]) -> Result<Self, AnalysisError> {
        let profile = if bytes.starts_with(&GZIP_MAGIC) {
            let mut raw = Vec::new();
            GzDecoder::new(bytes).read_to_end(&mut raw)?;
            proto::Profile::decode(raw.as_slice())?
        } else {
            proto::Profile::decode(bytes)?
        };
        Self::from_proto(&profile)
    }

    /// Resolve a decoded profile's id and string-table references
    pub fn from_proto(profile: &proto::Profile) -> Result<Self, AnalysisError> {
        let strings = &profile.string_table;
        let lookup = |idx: i64| -> Result<String, AnalysisError> {
            usize::try_from(idx)
                .ok()
                .and_then(|i| strings.get(i))
                .cloned()
                .ok_or(AnalysisError::UnknownString(idx))
        };

        let sample_types = profile
            .sample_type
            .iter()
            .map(|vt| Ok(ValueType::new(lookup(vt.r#type)?, lookup(vt.unit)?)))
            .collect::<Result<Vec<_>, AnalysisError>>()?;

        let functions: FxHashMap<u64, &proto::Function> =
            profile.function.iter().map(|f| (f.id, f)).collect();
        let locations: FxHashMap<u64, &proto::Location> =
            profile.location.iter().map(|l| (l.id, l)).collect();

        // Resolve each location once; many samples share locations
        let mut resolved: FxHashMap<u64, Vec<String>> = FxHashMap::default();
        let mut samples = Vec::with_capacity(profile.sample.len());

        for sample in &profile.sample {
            let mut frames = Vec::with_capacity(sample.location_id.len());
            for &loc_id in &sample.location_id {
                if let Some(names) = resolved.get(&loc_id) {
                    frames.extend(names.iter().cloned());
                    continue;
                }
                let location = locations
                    .get(&loc_id)
                    .ok_or(AnalysisError::UnknownLocation(loc_id))?;
                let names = if location.line.is_empty() {
                    vec![format!("0x{:x}", location.address)]
                } else {
                    location
                        .line
                        .iter()
                        .map(|line| {
                            let function = functions
                                .get(&line.function_id)
                                .ok_or(AnalysisError::UnknownFunction(line.function_id))?;
                            lookup(function.name)
                        })
                        .collect::<Result<Vec<_>, AnalysisError>>()?
                };
                frames.extend(names.iter().cloned());
                resolved.insert(loc_id, names);
            }
            samples.push(StackSample {
                frames,
                values: sample.value.clone(),
            });
        }

        Self::new(sample_types, samples)
    }

    /// Declared value streams
    pub fn sample_types(&self) -> &[ValueType] {
        &self.sample_types
    }

    /// All samples in profile order
    pub fn samples(&self) -> &[StackSample] {
        &self.samples
    }

    /// Slot index of the stream named `kind`
    pub fn value_index(&self, kind: &str) -> Option<usize> {
        self.sample_types.iter().position(|vt| vt.kind == kind)
    }

    /// Sum of slot `index` across all samples (0 for an out-of-range slot)
    pub fn total(&self, index: usize) -> i64 {
        self.samples
            .iter()
            .filter_map(|s| s.values.get(index))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn strings(table: &[&str]) -> Vec<String> {
        table.iter().map(|s| s.to_string()).collect()
    }

    /// main.main -> pkg.work (work inlines pkg.helper)
    fn sample_profile() -> proto::Profile {
        proto::Profile {
            sample_type: vec![
                proto::ValueType { r#type: 1, unit: 2 },
                proto::ValueType { r#type: 3, unit: 4 },
            ],
            sample: vec![
                proto::Sample {
                    location_id: vec![2, 1],
                    value: vec![3, 30_000_000],
                },
                proto::Sample {
                    location_id: vec![1],
                    value: vec![1, 10_000_000],
                },
            ],
            location: vec![
                proto::Location {
                    id: 1,
                    mapping_id: 1,
                    address: 0x1000,
                    line: vec![proto::Line {
                        function_id: 10,
                        line: 12,
                    }],
                },
                proto::Location {
                    id: 2,
                    mapping_id: 1,
                    address: 0x2000,
                    line: vec![
                        proto::Line {
                            function_id: 12,
                            line: 40,
                        },
                        proto::Line {
                            function_id: 11,
                            line: 31,
                        },
                    ],
                },
            ],
            function: vec![
                proto::Function {
                    id: 10,
                    name: 5,
                    system_name: 5,
                    filename: 0,
                },
                proto::Function {
                    id: 11,
                    name: 6,
                    system_name: 6,
                    filename: 0,
                },
                proto::Function {
                    id: 12,
                    name: 7,
                    system_name: 7,
                    filename: 0,
                },
            ],
            string_table: strings(&[
                "",
                "samples",
                "count",
                "cpu",
                "nanoseconds",
                "main.main",
                "example.com/mod/pkg.work",
                "example.com/mod/pkg.helper",
            ]),
            time_nanos: 0,
            duration_nanos: 1_000_000_000,
            period_type: None,
            period: 10_000_000,
        }
    }

    #[test]
    fn test_resolves_inlined_frames_leaf_first() {
        let set = SampleSet::from_proto(&sample_profile()).unwrap();
        assert_eq!(set.sample_types()[1], ValueType::new("cpu", "nanoseconds"));
        assert_eq!(
            set.samples()[0].frames,
            vec![
                "example.com/mod/pkg.helper",
                "example.com/mod/pkg.work",
                "main.main"
            ]
        );
        assert_eq!(set.samples()[1].frames, vec!["main.main"]);
        assert_eq!(set.total(0), 4);
        assert_eq!(set.value_index("cpu"), Some(1));
        assert_eq!(set.value_index("alloc_space"), None);
    }

    #[test]
    fn test_decode_gzipped_and_raw() {
        let raw = sample_profile().encode_to_vec();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let gz = encoder.finish().unwrap();

        let from_raw = SampleSet::decode(&raw).unwrap();
        let from_gz = SampleSet::decode(&gz).unwrap();
        assert_eq!(from_raw, from_gz);
        assert_eq!(from_gz.samples().len(), 2);
    }

    #[test]
    fn test_rejects_value_count_mismatch() {
        let err = SampleSet::new(
            vec![ValueType::new("cpu", "nanoseconds")],
            vec![StackSample::new(["f"], vec![1, 2])],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::ValueCountMismatch {
                index: 0,
                expected: 1,
                got: 2
            }
        ));
    }

    #[test]
    fn test_unknown_location_is_error() {
        let mut profile = sample_profile();
        profile.sample[0].location_id.push(99);
        assert!(matches!(
            SampleSet::from_proto(&profile),
            Err(AnalysisError::UnknownLocation(99))
        ));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(SampleSet::decode(&[0xff, 0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn test_unsymbolized_location_uses_address() {
        let mut profile = sample_profile();
        profile.location[0].line.clear();
        let set = SampleSet::from_proto(&profile).unwrap();
        assert_eq!(set.samples()[1].frames, vec!["0x1000"]);
    }
}
