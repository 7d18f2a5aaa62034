//! Replaces approximate distinct counts with exact parent counts where the approximation is known
//! to drift.

use std::collections::HashMap;

use crate::{
	Error, FacetService, Result,
	aggregation::{Aggregation, CORRECTION_AGG, SearchBody},
	collect::{self, Bucket},
	params::FilterParams,
	query,
	schema::{IndexKind, Route},
};

type Ceilings = &'static [(&'static str, u64)];

const PARTICIPANT_DASHBOARD: &[(&str, Ceilings)] = &[
	("disease_phase", &[("Initial Diagnosis", 4_000), ("Not Reported", 3_500)]),
	("diagnosis_classification_system", &[("ICD-O-3.2", 5_000), ("Indication for Study", 1_000)]),
	("diagnosis_basis", &[("Clinical", 3_500), ("Not Reported", 2_000), ("Unknown", 4_000)]),
	(
		"treatment_type",
		&[("Chemotherapy", 3_000), ("Radiation Therapy", 1_500), ("Surgical Procedure", 2_000)],
	),
	("last_known_survival_status", &[("Alive", 3_500), ("Unknown", 5_000)]),
	("sample_tumor_status", &[("Normal", 4_000), ("Tumor", 4_500)]),
	(
		"tumor_classification",
		&[("Primary", 1_000), ("Not Applicable", 4_000), ("Not Reported", 1_500)],
	),
	(
		"data_category",
		&[
			("Genomics", 1_000),
			("Pathology Imaging", 1_000),
			("Sequencing", 2_000),
			("Clinical", 1_500),
			("Copy Number Variation", 1_000),
		],
	),
	(
		"file_type",
		&[
			("bai", 1_500),
			("bam", 3_500),
			("crai", 3_600),
			("cram", 4_000),
			("fastq", 2_000),
			("html", 3_000),
			("idat", 1_000),
			("json", 2_000),
			("pdf", 3_000),
			("tsv", 1_000),
			("txt", 3_500),
			("dicom", 500),
			("vcf", 3_500),
		],
	),
	("library_selection", &[("Hybrid Selection", 4_500), ("Other", 1_000), ("Unspecified", 1_000)]),
	("library_source_material", &[("Bulk Cells", 3_000), ("Not Reported", 2_000)]),
	(
		"library_source_molecule",
		&[("Genomic", 5_000), ("Transcriptomic", 3_500), ("Not Reported", 1_000)],
	),
	("library_strategy", &[("WXS", 2_000), ("Other", 500), ("RNA-Seq", 1_000), ("WGS", 1_500)]),
	("file_mapping_level", &[("Participant", 1_000), ("Sample", 5_000)]),
];
const STUDY_SUMMARY: &[(&str, Ceilings)] =
	&[("data_category", &[("Pathology Imaging", 1_000), ("Sequencing", 500), ("Clinical", 1_500)])];

/// Per-field bucket ceilings above which an approximate count is not trusted.
#[derive(Debug, Clone, Default)]
pub struct ThresholdTable {
	ceilings: HashMap<&'static str, HashMap<&'static str, u64>>,
}
impl ThresholdTable {
	pub fn participant_dashboard() -> Self {
		Self::from_static(PARTICIPANT_DASHBOARD)
	}

	pub fn study_summary() -> Self {
		Self::from_static(STUDY_SUMMARY)
	}

	fn from_static(entries: &[(&'static str, Ceilings)]) -> Self {
		let ceilings = entries
			.iter()
			.map(|(field, labels)| (*field, labels.iter().copied().collect()))
			.collect();

		Self { ceilings }
	}

	pub fn covers(&self, field: &str) -> bool {
		self.ceilings.contains_key(field)
	}

	pub fn ceiling(&self, field: &str, label: &str) -> Option<u64> {
		self.ceilings.get(field).and_then(|labels| labels.get(label)).copied()
	}

	/// Labels in `buckets` whose count exceeds their ceiling, in bucket order.
	pub fn flagged(&self, field: &str, buckets: &[Bucket]) -> Vec<String> {
		buckets
			.iter()
			.filter(|bucket| {
				self.ceiling(field, &bucket.group).is_some_and(|ceiling| bucket.subjects > ceiling)
			})
			.map(|bucket| bucket.group.clone())
			.collect()
	}
}

/// A facet's filter counts and, when it has one, the widget view that mirrors them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetCounts {
	pub filter: Vec<Bucket>,
	pub widget: Option<Vec<Bucket>>,
}

/// Overwrites the counts of flagged buckets with exact ones. Every flagged label must have an
/// exact count.
pub fn splice(
	buckets: &mut [Bucket],
	flagged: &[String],
	exact: &HashMap<String, u64>,
) -> Result<()> {
	for bucket in buckets.iter_mut().filter(|bucket| flagged.contains(&bucket.group)) {
		bucket.subjects = *exact.get(&bucket.group).ok_or_else(|| Error::Correction {
			message: format!("No exact count returned for bucket {}.", bucket.group),
		})?;
	}

	Ok(())
}

impl FacetService {
	/// Runs the exact-count pass for `field` when any bucket in `counts.filter` exceeds its
	/// ceiling. `params` is the caller's full selection; the field itself is dropped before the
	/// exact query.
	pub async fn correct_facet(
		&self,
		field: &str,
		params: &FilterParams,
		table: &ThresholdTable,
		counts: &mut FacetCounts,
	) -> Result<()> {
		let flagged = table.flagged(field, &counts.filter);

		if flagged.is_empty() {
			return Ok(());
		}

		let Route::Nested(path) = self.routing.route(field, IndexKind::Participants) else {
			return Err(Error::Correction {
				message: format!("{field} is not nested on the participants index."),
			});
		};

		tracing::info!(field, flagged = ?flagged, "Correcting approximate facet counts.");

		let tree = query::compile(&self.routing, &params.without(field), IndexKind::Participants)?;
		let body = SearchBody::aggregations_only(tree).with_aggregation(
			CORRECTION_AGG,
			Aggregation::ReverseNested {
				path: path.as_str().to_string(),
				field: field.to_string(),
				include: flagged.clone(),
			},
		);
		let response = self.search(IndexKind::Participants, &body).await?;
		let exact: HashMap<String, u64> = collect::collect_reverse_nested(&response)?
			.into_iter()
			.map(|bucket| (bucket.group, bucket.subjects))
			.collect();

		splice(&mut counts.filter, &flagged, &exact)?;

		if let Some(widget) = counts.widget.as_mut() {
			splice(widget, &flagged, &exact)?;
		}

		Ok(())
	}
}
