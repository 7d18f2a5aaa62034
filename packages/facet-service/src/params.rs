use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result, schema::RoutingTable};

pub const PAGE_SIZE_KEY: &str = "first";
pub const OFFSET_KEY: &str = "offset";
pub const ORDER_BY_KEY: &str = "order_by";
pub const SORT_DIRECTION_KEY: &str = "sort_direction";
pub const IMPORT_DATA_KEY: &str = "import_data";

const UNKNOWN_POLICY_SUFFIX: &str = "_unknownAges";
const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 100_000;
const FIELD_ALIASES: &[(&str, &str)] = &[("participant_ids", "participant_id")];

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
	/// Membership in any of the values. An empty list matches nothing.
	Terms(Vec<String>),
	Range(RangeBound),
	/// A range field sent without usable bounds. Only its unknown-age policy constrains it.
	Unbounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeBound {
	pub lower: Option<i64>,
	pub upper: Option<i64>,
}

/// How the unknown-age sentinel participates in a range filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPolicy {
	#[default]
	Include,
	Exclude,
	Only,
}
impl UnknownPolicy {
	fn parse(field: &str, raw: &str) -> Result<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"" | "include" => Ok(Self::Include),
			"exclude" => Ok(Self::Exclude),
			"only" => Ok(Self::Only),
			other => Err(Error::InvalidRequest {
				message: format!(
					"{field}{UNKNOWN_POLICY_SUFFIX} must be one of include, exclude, or only, got '{other}'."
				),
			}),
		}
	}
}

/// One study's slice of an imported participant worklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedStudy {
	pub study_id: String,
	#[serde(rename = "participant_id", deserialize_with = "one_or_many")]
	pub participant_ids: Vec<String>,
}

/// A caller's filter selection, with absent and `[""]` fields already dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterParams {
	filters: BTreeMap<String, FilterValue>,
	policies: BTreeMap<String, UnknownPolicy>,
	imported: Vec<ImportedStudy>,
}
impl FilterParams {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses the caller's parameter dictionary. Paging and sort directives are skipped.
	pub fn from_map(map: &Map<String, Value>, routing: &RoutingTable) -> Result<Self> {
		let mut params = Self::default();

		for (key, value) in map {
			if matches!(
				key.as_str(),
				PAGE_SIZE_KEY | OFFSET_KEY | ORDER_BY_KEY | SORT_DIRECTION_KEY
			) {
				continue;
			}
			if key == IMPORT_DATA_KEY {
				params.imported = parse_imported(value)?;

				continue;
			}
			if let Some(field) = key.strip_suffix(UNKNOWN_POLICY_SUFFIX) {
				if let Some(raw) = first_string(value) {
					params.policies.insert(field.to_string(), UnknownPolicy::parse(field, &raw)?);
				}

				continue;
			}

			let field = canonical_field(key);

			if routing.is_range(field) {
				match parse_range(field, value)? {
					Some(bound) => {
						params.filters.insert(field.to_string(), FilterValue::Range(bound));
					},
					None if !value.is_null() => {
						params.filters.insert(field.to_string(), FilterValue::Unbounded);
					},
					None => {},
				}

				continue;
			}

			if let Some(values) = parse_terms(key, value)? {
				match params.filters.get_mut(field) {
					Some(FilterValue::Terms(existing)) => existing.extend(values),
					_ => {
						params.filters.insert(field.to_string(), FilterValue::Terms(values));
					},
				}
			}
		}

		Ok(params)
	}

	pub fn with_terms<I, S>(mut self, field: &str, values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.filters.insert(
			field.to_string(),
			FilterValue::Terms(values.into_iter().map(Into::into).collect()),
		);

		self
	}

	pub fn with_range(mut self, field: &str, bound: RangeBound) -> Self {
		self.filters.insert(field.to_string(), FilterValue::Range(bound));

		self
	}

	pub fn with_unbounded(mut self, field: &str) -> Self {
		self.filters.insert(field.to_string(), FilterValue::Unbounded);

		self
	}

	pub fn with_policy(mut self, field: &str, policy: UnknownPolicy) -> Self {
		self.policies.insert(field.to_string(), policy);

		self
	}

	pub fn with_imported(mut self, imported: Vec<ImportedStudy>) -> Self {
		self.imported = imported;

		self
	}

	/// The same selection with `field` unconstrained.
	pub fn without(&self, field: &str) -> Self {
		let mut params = self.clone();

		params.filters.remove(field);
		params.policies.remove(field);

		params
	}

	pub fn filters(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
		self.filters.iter().map(|(field, value)| (field.as_str(), value))
	}

	pub fn get(&self, field: &str) -> Option<&FilterValue> {
		self.filters.get(field)
	}

	/// Policy for a range field; fields without an explicit policy include unknowns.
	pub fn policy(&self, field: &str) -> UnknownPolicy {
		self.policies.get(field).copied().unwrap_or_default()
	}

	/// Non-default policies that apply to a present range field, bounded or not.
	pub fn effective_policies(&self) -> impl Iterator<Item = (&str, UnknownPolicy)> {
		self.policies.iter().filter_map(|(field, policy)| {
			let applies = matches!(
				self.filters.get(field),
				Some(FilterValue::Range(_) | FilterValue::Unbounded)
			);

			(applies && *policy != UnknownPolicy::Include).then_some((field.as_str(), *policy))
		})
	}

	pub fn terms(&self, field: &str) -> Option<&[String]> {
		match self.filters.get(field) {
			Some(FilterValue::Terms(values)) => Some(values.as_slice()),
			_ => None,
		}
	}

	pub fn imported(&self) -> &[ImportedStudy] {
		&self.imported
	}

	pub fn has_imported(&self) -> bool {
		!self.imported.is_empty()
	}

	pub fn is_unconstrained(&self) -> bool {
		let filtered =
			self.filters.values().any(|value| !matches!(value, FilterValue::Unbounded));

		!filtered && self.effective_policies().next().is_none() && self.imported.is_empty()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
	pub size: u64,
	pub offset: u64,
}
impl Default for Page {
	fn default() -> Self {
		Self { size: DEFAULT_PAGE_SIZE, offset: 0 }
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
	#[default]
	Asc,
	Desc,
}
impl SortDirection {
	/// Anything other than `asc` or `desc`, in any case, sorts ascending.
	pub fn parse_lenient(raw: &str) -> Self {
		if raw.trim().eq_ignore_ascii_case("desc") { Self::Desc } else { Self::Asc }
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Asc => "asc",
			Self::Desc => "desc",
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortRequest {
	pub order_by: Option<String>,
	pub direction: SortDirection,
}

/// Filters plus the paging and sort directives of a listing call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingParams {
	pub filters: FilterParams,
	pub page: Page,
	pub sort: SortRequest,
}
impl ListingParams {
	pub fn from_map(map: &Map<String, Value>, routing: &RoutingTable) -> Result<Self> {
		let filters = FilterParams::from_map(map, routing)?;
		let mut page = Page::default();

		if let Some(value) = map.get(PAGE_SIZE_KEY) {
			page.size = parse_count(PAGE_SIZE_KEY, value)?;

			if page.size > MAX_PAGE_SIZE {
				return Err(Error::InvalidRequest {
					message: format!("{PAGE_SIZE_KEY} must not exceed {MAX_PAGE_SIZE}."),
				});
			}
		}
		if let Some(value) = map.get(OFFSET_KEY) {
			page.offset = parse_count(OFFSET_KEY, value)?;
		}

		let sort = SortRequest {
			order_by: map.get(ORDER_BY_KEY).and_then(Value::as_str).map(str::to_string),
			direction: map
				.get(SORT_DIRECTION_KEY)
				.and_then(Value::as_str)
				.map(SortDirection::parse_lenient)
				.unwrap_or_default(),
		};

		Ok(Self { filters, page, sort })
	}
}

fn canonical_field(key: &str) -> &str {
	FIELD_ALIASES
		.iter()
		.find_map(|(alias, field)| (*alias == key).then_some(*field))
		.unwrap_or(key)
}

fn is_blank_selection(values: &[Value]) -> bool {
	matches!(values, [Value::String(only)] if only.is_empty())
}

fn first_string(value: &Value) -> Option<String> {
	match value {
		Value::String(raw) => Some(raw.clone()),
		Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
		_ => None,
	}
}

fn parse_terms(key: &str, value: &Value) -> Result<Option<Vec<String>>> {
	let items = match value {
		Value::Null => return Ok(None),
		Value::String(raw) if raw.is_empty() => return Ok(None),
		Value::String(raw) => return Ok(Some(vec![raw.clone()])),
		Value::Array(items) => items,
		_ => {
			return Err(Error::InvalidRequest {
				message: format!("{key} must be a string or a list of strings."),
			});
		},
	};

	if is_blank_selection(items) {
		return Ok(None);
	}

	let mut values = Vec::with_capacity(items.len());

	for item in items {
		match item {
			Value::String(raw) => values.push(raw.clone()),
			Value::Number(number) => values.push(number.to_string()),
			Value::Bool(flag) => values.push(flag.to_string()),
			_ => {
				return Err(Error::InvalidRequest {
					message: format!("{key} values must be scalars."),
				});
			},
		}
	}

	Ok(Some(values))
}

fn parse_range(field: &str, value: &Value) -> Result<Option<RangeBound>> {
	let items = match value {
		Value::Null => return Ok(None),
		Value::Array(items) => items,
		_ => {
			return Err(Error::InvalidRequest {
				message: format!("{field} must be a two-element list of bounds."),
			});
		},
	};

	if items.len() < 2 || is_blank_selection(items) {
		return Ok(None);
	}

	let bound = RangeBound {
		lower: parse_bound(field, &items[0])?,
		upper: parse_bound(field, &items[1])?,
	};

	if bound.lower.is_none() && bound.upper.is_none() {
		return Err(Error::InvalidRange { field: field.to_string() });
	}

	Ok(Some(bound))
}

fn parse_bound(field: &str, value: &Value) -> Result<Option<i64>> {
	let invalid = || Error::InvalidRequest {
		message: format!("{field} bounds must be whole numbers or null."),
	};

	match value {
		Value::Null => Ok(None),
		Value::String(raw) if raw.trim().is_empty() => Ok(None),
		Value::String(raw) => raw.trim().parse::<i64>().map(Some).map_err(|_| invalid()),
		Value::Number(number) => {
			if let Some(whole) = number.as_i64() {
				return Ok(Some(whole));
			}

			match number.as_f64() {
				Some(float) if float.fract() == 0.0 && float.is_finite() => Ok(Some(float as i64)),
				_ => Err(invalid()),
			}
		},
		_ => Err(invalid()),
	}
}

fn parse_count(key: &str, value: &Value) -> Result<u64> {
	value.as_u64().ok_or_else(|| Error::InvalidRequest {
		message: format!("{key} must be a non-negative integer."),
	})
}

fn parse_imported(value: &Value) -> Result<Vec<ImportedStudy>> {
	let items = match value {
		Value::Null => return Ok(Vec::new()),
		Value::Array(items) => items,
		_ => {
			return Err(Error::InvalidRequest {
				message: format!("{IMPORT_DATA_KEY} must be a list."),
			});
		},
	};

	if items.is_empty() || is_blank_selection(items) {
		return Ok(Vec::new());
	}

	let mut imported = Vec::with_capacity(items.len());

	for (position, item) in items.iter().enumerate() {
		let entry = match item {
			Value::String(raw) => serde_json::from_str::<ImportedStudy>(raw),
			other => serde_json::from_value::<ImportedStudy>(other.clone()),
		}
		.map_err(|err| Error::InvalidRequest {
			message: format!("{IMPORT_DATA_KEY}[{position}] is not a valid study entry: {err}"),
		})?;

		imported.push(entry);
	}

	Ok(imported)
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum OneOrMany {
		One(String),
		Many(Vec<String>),
	}

	Ok(match OneOrMany::deserialize(deserializer)? {
		OneOrMany::One(value) => vec![value],
		OneOrMany::Many(values) => values,
	})
}
