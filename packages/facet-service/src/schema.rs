//! Static description of the catalog's entity indices and where each logical filter field lives
//! inside them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Reserved value stored in range fields whose true value is unknown.
pub const SENTINEL: i64 = -999;

/// A query target. `FilesOverall` reads the files index without the completeness guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
	Participants,
	Diagnosis,
	Samples,
	Treatments,
	TreatmentResponses,
	Survivals,
	Studies,
	Cohorts,
	Files,
	FilesOverall,
}
impl IndexKind {
	pub const ALL: [Self; 10] = [
		Self::Participants,
		Self::Diagnosis,
		Self::Samples,
		Self::Treatments,
		Self::TreatmentResponses,
		Self::Survivals,
		Self::Studies,
		Self::Cohorts,
		Self::Files,
		Self::FilesOverall,
	];

	/// Name of the physical index in the store.
	pub fn index_name(self) -> &'static str {
		match self {
			Self::Participants => "participants",
			Self::Diagnosis => "diagnosis",
			Self::Samples => "samples",
			Self::Treatments => "treatments",
			Self::TreatmentResponses => "treatment_responses",
			Self::Survivals => "survivals",
			Self::Studies => "studies",
			Self::Cohorts => "cohorts",
			Self::Files | Self::FilesOverall => "files",
		}
	}

	/// Field that must exist on a document for it to count as a complete row.
	pub fn completeness_guard(self) -> Option<&'static str> {
		match self {
			Self::Files => Some("file_id"),
			_ => None,
		}
	}

	pub fn is_files(self) -> bool {
		matches!(self, Self::Files | Self::FilesOverall)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldGroup {
	Participant,
	Diagnosis,
	Sample,
	File,
	Survival,
	Treatment,
	TreatmentResponse,
	/// Study-level and identifier fields, local on every index.
	Unscoped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
	Term,
	/// Numeric day count that may hold [`SENTINEL`].
	Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
	pub group: FieldGroup,
	pub kind: FieldKind,
}

/// Nested sub-document paths. Declaration order is the order nested scopes are emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NestedPath {
	Diagnosis,
	Survival,
	Treatment,
	TreatmentResponse,
	SampleFile,
	File,
	SampleDiagnosisFile,
	Combined,
	CombinedSampleDiagnosis,
	CombinedSurvival,
	CombinedTreatment,
	CombinedTreatmentResponse,
}
impl NestedPath {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Diagnosis => "diagnosis_filters",
			Self::Survival => "survival_filters",
			Self::Treatment => "treatment_filters",
			Self::TreatmentResponse => "treatment_response_filters",
			Self::SampleFile => "sample_file_filters",
			Self::File => "file_filters",
			Self::SampleDiagnosisFile => "sample_diagnosis_file_filters",
			Self::Combined => "combined_filters",
			Self::CombinedSampleDiagnosis => "combined_filters.sample_diagnosis_filters",
			Self::CombinedSurvival => "combined_filters.survival_filters",
			Self::CombinedTreatment => "combined_filters.treatment_filters",
			Self::CombinedTreatmentResponse => "combined_filters.treatment_response_filters",
		}
	}

	/// Enclosing nested scope, for paths that live inside another nested document.
	pub fn parent(self) -> Option<Self> {
		match self {
			Self::CombinedSampleDiagnosis
			| Self::CombinedSurvival
			| Self::CombinedTreatment
			| Self::CombinedTreatmentResponse => Some(Self::Combined),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
	Local,
	Nested(NestedPath),
}
impl Route {
	/// Fully qualified storage path of `field` under this route.
	pub fn field_path(self, field: &str) -> String {
		match self {
			Self::Local => field.to_string(),
			Self::Nested(path) => format!("{}.{field}", path.as_str()),
		}
	}
}

struct RouteRule {
	group: FieldGroup,
	indices: &'static [IndexKind],
	path: NestedPath,
}

const FIELDS: &[(&str, FieldGroup, FieldKind)] = &[
	("race", FieldGroup::Participant, FieldKind::Term),
	("sex_at_birth", FieldGroup::Participant, FieldKind::Term),
	("participant_id", FieldGroup::Participant, FieldKind::Term),
	("diagnosis", FieldGroup::Diagnosis, FieldKind::Term),
	("disease_phase", FieldGroup::Diagnosis, FieldKind::Term),
	("diagnosis_classification_system", FieldGroup::Diagnosis, FieldKind::Term),
	("diagnosis_basis", FieldGroup::Diagnosis, FieldKind::Term),
	("tumor_grade_source", FieldGroup::Diagnosis, FieldKind::Term),
	("tumor_stage_source", FieldGroup::Diagnosis, FieldKind::Term),
	("diagnosis_anatomic_site", FieldGroup::Diagnosis, FieldKind::Term),
	("diagnosis_category", FieldGroup::Diagnosis, FieldKind::Term),
	("age_at_diagnosis", FieldGroup::Diagnosis, FieldKind::Range),
	("sample_anatomic_site", FieldGroup::Sample, FieldKind::Term),
	("sample_tumor_status", FieldGroup::Sample, FieldKind::Term),
	("tumor_classification", FieldGroup::Sample, FieldKind::Term),
	("participant_age_at_collection", FieldGroup::Sample, FieldKind::Range),
	("data_category", FieldGroup::File, FieldKind::Term),
	("file_type", FieldGroup::File, FieldKind::Term),
	("library_selection", FieldGroup::File, FieldKind::Term),
	("library_source_material", FieldGroup::File, FieldKind::Term),
	("library_source_molecule", FieldGroup::File, FieldKind::Term),
	("library_strategy", FieldGroup::File, FieldKind::Term),
	("file_mapping_level", FieldGroup::File, FieldKind::Term),
	("last_known_survival_status", FieldGroup::Survival, FieldKind::Term),
	("first_event", FieldGroup::Survival, FieldKind::Term),
	("age_at_last_known_survival_status", FieldGroup::Survival, FieldKind::Range),
	("treatment_type", FieldGroup::Treatment, FieldKind::Term),
	("treatment_agent", FieldGroup::Treatment, FieldKind::Term),
	("age_at_treatment_start", FieldGroup::Treatment, FieldKind::Range),
	("response_category", FieldGroup::TreatmentResponse, FieldKind::Term),
	("age_at_response", FieldGroup::TreatmentResponse, FieldKind::Range),
];

// Indices whose documents carry the wide participant-centric nested layout.
const PARTICIPANT_SHAPED: &[IndexKind] = &[
	IndexKind::Participants,
	IndexKind::Treatments,
	IndexKind::TreatmentResponses,
	IndexKind::Survivals,
	IndexKind::Studies,
	IndexKind::Cohorts,
];
const FILES: &[IndexKind] = &[IndexKind::Files, IndexKind::FilesOverall];

const ROUTES: &[RouteRule] = &[
	RouteRule {
		group: FieldGroup::Participant,
		indices: FILES,
		path: NestedPath::Combined,
	},
	RouteRule {
		group: FieldGroup::Diagnosis,
		indices: PARTICIPANT_SHAPED,
		path: NestedPath::SampleDiagnosisFile,
	},
	RouteRule {
		group: FieldGroup::Diagnosis,
		indices: &[IndexKind::Samples],
		path: NestedPath::Diagnosis,
	},
	RouteRule {
		group: FieldGroup::Diagnosis,
		indices: FILES,
		path: NestedPath::CombinedSampleDiagnosis,
	},
	RouteRule {
		group: FieldGroup::Sample,
		indices: PARTICIPANT_SHAPED,
		path: NestedPath::SampleDiagnosisFile,
	},
	RouteRule {
		group: FieldGroup::Sample,
		indices: &[IndexKind::Diagnosis],
		path: NestedPath::SampleFile,
	},
	RouteRule {
		group: FieldGroup::Sample,
		indices: FILES,
		path: NestedPath::CombinedSampleDiagnosis,
	},
	RouteRule {
		group: FieldGroup::File,
		indices: PARTICIPANT_SHAPED,
		path: NestedPath::SampleDiagnosisFile,
	},
	RouteRule {
		group: FieldGroup::File,
		indices: &[IndexKind::Diagnosis],
		path: NestedPath::SampleFile,
	},
	RouteRule {
		group: FieldGroup::File,
		indices: &[IndexKind::Samples],
		path: NestedPath::File,
	},
	RouteRule {
		group: FieldGroup::Survival,
		indices: &[
			IndexKind::Participants,
			IndexKind::Diagnosis,
			IndexKind::Samples,
			IndexKind::Treatments,
			IndexKind::TreatmentResponses,
			IndexKind::Studies,
			IndexKind::Cohorts,
		],
		path: NestedPath::Survival,
	},
	RouteRule {
		group: FieldGroup::Survival,
		indices: FILES,
		path: NestedPath::CombinedSurvival,
	},
	RouteRule {
		group: FieldGroup::Treatment,
		indices: &[
			IndexKind::Participants,
			IndexKind::Diagnosis,
			IndexKind::Samples,
			IndexKind::TreatmentResponses,
			IndexKind::Survivals,
			IndexKind::Studies,
			IndexKind::Cohorts,
		],
		path: NestedPath::Treatment,
	},
	RouteRule {
		group: FieldGroup::Treatment,
		indices: FILES,
		path: NestedPath::CombinedTreatment,
	},
	RouteRule {
		group: FieldGroup::TreatmentResponse,
		indices: &[
			IndexKind::Participants,
			IndexKind::Diagnosis,
			IndexKind::Samples,
			IndexKind::Treatments,
			IndexKind::Survivals,
			IndexKind::Studies,
			IndexKind::Cohorts,
		],
		path: NestedPath::TreatmentResponse,
	},
	RouteRule {
		group: FieldGroup::TreatmentResponse,
		indices: FILES,
		path: NestedPath::CombinedTreatmentResponse,
	},
];

/// Field definitions and the (field group, index) routing table, built once at startup.
#[derive(Debug, Clone)]
pub struct RoutingTable {
	fields: HashMap<&'static str, FieldDef>,
	routes: HashMap<(FieldGroup, IndexKind), NestedPath>,
}
impl RoutingTable {
	pub fn new() -> Self {
		let fields = FIELDS
			.iter()
			.map(|(name, group, kind)| (*name, FieldDef { group: *group, kind: *kind }))
			.collect();
		let mut routes = HashMap::new();

		for rule in ROUTES {
			for index in rule.indices {
				routes.insert((rule.group, *index), rule.path);
			}
		}

		Self { fields, routes }
	}

	/// Fields missing from the table are unscoped terms.
	pub fn field(&self, name: &str) -> FieldDef {
		self.fields
			.get(name)
			.copied()
			.unwrap_or(FieldDef { group: FieldGroup::Unscoped, kind: FieldKind::Term })
	}

	pub fn is_range(&self, name: &str) -> bool {
		self.field(name).kind == FieldKind::Range
	}

	pub fn route(&self, field: &str, index: IndexKind) -> Route {
		let group = self.field(field).group;

		match self.routes.get(&(group, index)) {
			Some(path) => Route::Nested(*path),
			None => Route::Local,
		}
	}
}
impl Default for RoutingTable {
	fn default() -> Self {
		Self::new()
	}
}
