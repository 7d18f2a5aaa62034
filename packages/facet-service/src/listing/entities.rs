//! Per-entity listing tables: which stored fields each row exposes and under what name, how
//! callers may sort, and which filter sub-documents are kept out of the response.

use crate::{aggregation::SourceFilter, schema::IndexKind};

/// `(display, storage)` pairs.
pub type FieldPairs = &'static [(&'static str, &'static str)];

#[derive(Debug, Clone, Copy)]
pub struct ListingSpec {
	pub index: IndexKind,
	pub projection: FieldPairs,
	pub default_sort: &'static str,
	pub sort_aliases: FieldPairs,
	pub source: Option<SourceFilter>,
}
impl ListingSpec {
	pub fn sort_field(&self, order_by: &str) -> Option<&'static str> {
		self.sort_aliases
			.iter()
			.find_map(|(display, storage)| (*display == order_by).then_some(*storage))
	}
}

pub const PARTICIPANTS: ListingSpec = ListingSpec {
	index: IndexKind::Participants,
	projection: &[
		("id", "id"),
		("participant_id", "participant_id"),
		("dbgap_accession", "dbgap_accession"),
		("study_id", "study_id"),
		("race", "race_str"),
		("sex_at_birth", "sex_at_birth"),
		("synonym_id", "alternate_participant_id"),
		("files", "files"),
		("diagnosis", "diagnosis_str"),
		("anatomic_site", "diagnosis_anatomic_site_str"),
		("diagnosis_category", "diagnosis_category_str"),
		("age_at_diagnosis", "age_at_diagnosis_str"),
		("treatment_agent", "treatment_agent_str"),
		("treatment_type", "treatment_type_str"),
		("age_at_treatment_start", "age_at_treatment_start_str"),
		("first_event", "first_event_str"),
		("last_known_survival_status", "last_known_survival_status_str"),
		("age_at_last_known_survival_status", "age_at_last_known_survival_status_str"),
	],
	default_sort: "participant_id",
	sort_aliases: &[
		("id", "id"),
		("participant_id", "participant_id"),
		("dbgap_accession", "dbgap_accession"),
		("study_id", "study_id"),
		("race", "race_str"),
		("sex_at_birth", "sex_at_birth"),
		("synonym_id", "alternate_participant_id"),
		("diagnosis", "diagnosis_str"),
		("diagnosis_category", "diagnosis_category_str"),
		("anatomic_site", "diagnosis_anatomic_site_str"),
		("age_at_diagnosis", "age_at_diagnosis_str"),
		("treatment_agent", "treatment_agent_str"),
		("treatment_type", "treatment_type_str"),
		("age_at_treatment_start", "age_at_treatment_start_str"),
		("first_event", "first_event_str"),
		("last_known_survival_status", "last_known_survival_status_str"),
		("age_at_last_known_survival_status", "age_at_last_known_survival_status_str"),
	],
	source: Some(SourceFilter::Exclude(&[
		"sample_diagnosis_file_filters",
		"survival_filters",
		"treatment_filters",
		"treatment_response_filters",
	])),
};

pub const DIAGNOSIS: ListingSpec = ListingSpec {
	index: IndexKind::Diagnosis,
	projection: &[
		("d_id", "id"),
		("pid", "pid"),
		("diagnosis_id", "diagnosis_id"),
		("participant_id", "participant_id"),
		("sample_id", "sample_id"),
		("dbgap_accession", "dbgap_accession"),
		("study_id", "study_id"),
		("diagnosis", "diagnosis"),
		("anatomic_site", "diagnosis_anatomic_site_str"),
		("disease_phase", "disease_phase"),
		("diagnosis_classification_system", "diagnosis_classification_system"),
		("diagnosis_basis", "diagnosis_basis"),
		("diagnosis_category", "diagnosis_category"),
		("age_at_diagnosis", "age_at_diagnosis"),
		("tumor_grade_source", "tumor_grade_source"),
		("tumor_stage_source", "tumor_stage_source"),
		("files", "files"),
	],
	default_sort: "diagnosis_id",
	sort_aliases: &[
		("diagnosis_id", "diagnosis_id"),
		("participant_id", "participant_id"),
		("sample_id", "sample_id"),
		("dbgap_accession", "dbgap_accession"),
		("study_id", "study_id"),
		("diagnosis", "diagnosis"),
		("anatomic_site", "diagnosis_anatomic_site_str"),
		("disease_phase", "disease_phase"),
		("diagnosis_basis", "diagnosis_basis"),
		("diagnosis_classification_system", "diagnosis_classification_system"),
		("age_at_diagnosis", "age_at_diagnosis"),
		("tumor_grade_source", "tumor_grade_source"),
		("tumor_stage_source", "tumor_stage_source"),
	],
	source: Some(SourceFilter::Exclude(&[
		"sample_file_filters",
		"survival_filters",
		"treatment_filters",
		"treatment_response_filters",
	])),
};

pub const SAMPLES: ListingSpec = ListingSpec {
	index: IndexKind::Samples,
	projection: &[
		("id", "id"),
		("sample_id", "sample_id"),
		("participant_id", "participant_id"),
		("study_id", "study_id"),
		("anatomic_site", "sample_anatomic_site_str"),
		("participant_age_at_collection", "participant_age_at_collection"),
		("sample_tumor_status", "sample_tumor_status"),
		("tumor_classification", "tumor_classification"),
		("diagnosis", "diagnosis_str"),
		("diagnosis_category", "diagnosis_category_str"),
		("files", "files"),
	],
	default_sort: "sample_id",
	sort_aliases: &[
		("sample_id", "sample_id"),
		("participant_id", "participant_id"),
		("study_id", "study_id"),
		("anatomic_site", "sample_anatomic_site_str"),
		("participant_age_at_collection", "participant_age_at_collection"),
		("sample_tumor_status", "sample_tumor_status"),
		("tumor_classification", "tumor_classification"),
		("diagnosis", "diagnosis_str"),
		("diagnosis_category", "diagnosis_category_str"),
	],
	source: Some(SourceFilter::Exclude(&[
		"diagnosis_filters",
		"file_filters",
		"survival_filters",
		"treatment_filters",
		"treatment_response_filters",
	])),
};

const FILE_FIELDS: &[&str] = &[
	"id",
	"file_id",
	"guid",
	"file_name",
	"data_category",
	"file_description",
	"file_type",
	"file_size",
	"library_selection",
	"library_source_material",
	"library_source_molecule",
	"library_strategy",
	"file_mapping_level",
	"file_access",
	"study_id",
	"participant_id",
	"sample_id",
	"md5sum",
	"files",
];

pub const FILES: ListingSpec = ListingSpec {
	index: IndexKind::Files,
	projection: &[
		("id", "id"),
		("file_id", "file_id"),
		("guid", "guid"),
		("file_name", "file_name"),
		("data_category", "data_category"),
		("file_description", "file_description"),
		("file_type", "file_type"),
		("file_size", "file_size"),
		("library_selection", "library_selection"),
		("library_source_material", "library_source_material"),
		("library_source_molecule", "library_source_molecule"),
		("library_strategy", "library_strategy"),
		("file_mapping_level", "file_mapping_level"),
		("file_access", "file_access"),
		("study_id", "study_id"),
		("participant_id", "participant_id"),
		("sample_id", "sample_id"),
		("md5sum", "md5sum"),
		("files", "files"),
	],
	default_sort: "file_id",
	sort_aliases: &[
		("file_id", "file_id"),
		("guid", "guid"),
		("file_name", "file_name"),
		("data_category", "data_category"),
		("file_description", "file_description"),
		("file_type", "file_type"),
		("file_size", "file_size"),
		("study_id", "study_id"),
		("library_selection", "library_selection.sort"),
		("library_source_material", "library_source_material.sort"),
		("library_source_molecule", "library_source_molecule.sort"),
		("library_strategy", "library_strategy.sort"),
		("file_mapping_level", "file_mapping_level"),
		("file_access", "file_access"),
		("participant_id", "participant_id"),
		("sample_id", "sample_id"),
		("md5sum", "md5sum"),
	],
	source: Some(SourceFilter::Include(FILE_FIELDS)),
};

pub const STUDY_OVERVIEW: ListingSpec = ListingSpec {
	index: IndexKind::Studies,
	projection: &[
		("id", "id"),
		("study_id", "study_id"),
		("grant_id", "grant_id"),
		("dbgap_accession", "dbgap_accession"),
		("study_name", "study_name"),
		("study_status", "study_status"),
		("personnel_name", "PIs"),
		("num_of_participants", "num_of_participants"),
		("diagnosis", "diagnosis_cancer"),
		("num_of_samples", "num_of_samples"),
		("anatomic_site", "diagnosis_anatomic_site"),
		("num_of_files", "num_of_files"),
		("file_type", "file_types"),
		("pubmed_id", "pubmed_ids"),
		("files", "files"),
	],
	default_sort: "study_id",
	sort_aliases: &[
		("study_id", "study_id"),
		("pubmed_id", "pubmed_ids"),
		("grant_id", "grant_id"),
		("dbgap_accession", "dbgap_accession"),
		("study_name", "study_name"),
		("study_status", "study_status"),
		("personnel_name", "PIs"),
		("num_of_participants", "num_of_participants"),
		("num_of_samples", "num_of_samples"),
		("num_of_files", "num_of_files"),
	],
	source: None,
};

pub const STUDIES: ListingSpec = ListingSpec {
	index: IndexKind::Studies,
	projection: &[
		("id", "id"),
		("study_id", "study_id"),
		("study_name", "study_name"),
		("num_of_participants", "num_of_participants"),
		("num_of_samples", "num_of_samples"),
		("num_of_diagnoses", "num_of_diagnoses"),
		("sex_at_birth", "sex_at_birth"),
		("num_of_files", "num_of_files"),
		("num_of_study_files", "num_of_study_files"),
		("num_of_participant_files", "num_of_participant_files"),
		("num_of_sample_files", "num_of_sample_files"),
		("num_of_publications", "num_of_publications"),
	],
	default_sort: "dbgap_accession",
	sort_aliases: &[
		("study_id", "study_id"),
		("study_name", "study_name"),
		("num_of_participants", "num_of_participants"),
		("num_of_samples", "num_of_samples"),
		("num_of_diagnoses", "num_of_diagnoses"),
		("num_of_files", "num_of_files"),
		("num_of_study_files", "num_of_study_files"),
		("num_of_participant_files", "num_of_participant_files"),
		("num_of_sample_files", "num_of_sample_files"),
		("num_of_publications", "num_of_publications"),
	],
	source: None,
};

/// The single study row shown on a study's summary page.
pub const STUDY_DETAIL: ListingSpec = ListingSpec {
	index: IndexKind::Studies,
	projection: &[
		("id", "id"),
		("study_id", "study_id"),
		("dbgap_accession", "dbgap_accession"),
		("study_name", "study_name"),
		("study_description", "study_description"),
		("pubmed_ids", "pubmed_ids"),
		("num_of_participants", "num_of_participants"),
		("num_of_samples", "num_of_samples"),
		("num_of_files", "num_of_files"),
	],
	default_sort: "dbgap_accession",
	sort_aliases: &[
		("study_id", "study_id"),
		("study_name", "study_name"),
		("study_description", "study_description"),
		("pubmed_ids", "pubmed_ids"),
		("num_of_participants", "num_of_participants"),
		("num_of_samples", "num_of_samples"),
		("num_of_files", "num_of_files"),
	],
	source: None,
};

pub const COHORT_MANIFEST: ListingSpec = ListingSpec {
	index: IndexKind::Cohorts,
	projection: &[
		("id", "id"),
		("participant_id", "participant_id"),
		("dbgap_accession", "dbgap_accession"),
		("race", "race"),
		("sex_at_birth", "sex_at_birth"),
		("diagnosis", "diagnosis_str"),
	],
	default_sort: "participant_id",
	sort_aliases: &[
		("participant_id", "participant_id"),
		("dbgap_accession", "dbgap_accession"),
		("race", "race"),
		("sex_at_birth", "sex_at_birth"),
		("diagnosis", "diagnosis_str"),
	],
	source: None,
};

pub const COHORT_METADATA: ListingSpec = ListingSpec {
	index: IndexKind::Cohorts,
	projection: &[
		("id", "id"),
		("participant_id", "participant_id"),
		("dbgap_accession", "dbgap_accession"),
		("race", "race"),
		("sex_at_birth", "sex_at_birth"),
		("diagnoses", "diagnoses"),
		("survivals", "survivals"),
		("treatments", "treatments"),
		("treatment_responses", "treatment_responses"),
		("samples", "samples"),
		("files", "files"),
	],
	default_sort: "participant_id",
	sort_aliases: &[
		("participant_id", "participant_id"),
		("dbgap_accession", "dbgap_accession"),
		("race", "race"),
		("sex_at_birth", "sex_at_birth"),
	],
	source: None,
};

/// Cross-index lookup of internal participant ids.
pub const PARTICIPANT_IDENTITY: ListingSpec = ListingSpec {
	index: IndexKind::Participants,
	projection: &[("id", "id"), ("participant_id", "participant_id"), ("study_id", "study_id")],
	default_sort: "participant_id",
	sort_aliases: &[],
	source: Some(SourceFilter::Include(&["id", "participant_id", "study_id"])),
};
