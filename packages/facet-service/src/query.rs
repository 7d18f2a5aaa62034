use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{
	Error, Result,
	params::{FilterParams, FilterValue, ImportedStudy, RangeBound, UnknownPolicy},
	schema::{IndexKind, NestedPath, Route, RoutingTable, SENTINEL},
};

/// Compiled boolean expression in the store's query grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
	MatchAll,
	Exists { field: String },
	Term { field: String, value: Value },
	Terms { field: String, values: Vec<Value> },
	Range { field: String, gte: Option<i64>, lte: Option<i64> },
	Nested { path: String, query: Box<Query> },
	Bool(BoolQuery),
}
impl Query {
	pub fn to_value(&self) -> Value {
		match self {
			Self::MatchAll => serde_json::json!({ "match_all": {} }),
			Self::Exists { field } => serde_json::json!({ "exists": { "field": field } }),
			Self::Term { field, value } => {
				let mut inner = Map::new();

				inner.insert(field.clone(), value.clone());

				serde_json::json!({ "term": inner })
			},
			Self::Terms { field, values } => {
				let mut inner = Map::new();

				inner.insert(field.clone(), Value::Array(values.clone()));

				serde_json::json!({ "terms": inner })
			},
			Self::Range { field, gte, lte } => {
				let mut bounds = Map::new();

				if let Some(gte) = gte {
					bounds.insert("gte".to_string(), Value::from(*gte));
				}
				if let Some(lte) = lte {
					bounds.insert("lte".to_string(), Value::from(*lte));
				}

				let mut inner = Map::new();

				inner.insert(field.clone(), Value::Object(bounds));

				serde_json::json!({ "range": inner })
			},
			Self::Nested { path, query } => {
				serde_json::json!({ "nested": { "path": path, "query": query.to_value() } })
			},
			Self::Bool(bool_query) => bool_query.to_value(),
		}
	}

	pub fn terms<I, S>(field: &str, values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::Terms {
			field: field.to_string(),
			values: values.into_iter().map(|value| Value::String(value.into())).collect(),
		}
	}

	pub fn term(field: &str, value: impl Into<Value>) -> Self {
		Self::Term { field: field.to_string(), value: value.into() }
	}

	pub fn is_match_all(&self) -> bool {
		matches!(self, Self::MatchAll)
	}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
	pub must: Vec<Query>,
	pub filter: Vec<Query>,
	pub should: Vec<Query>,
	pub must_not: Vec<Query>,
	pub minimum_should_match: Option<u32>,
}
impl BoolQuery {
	pub fn filter(clauses: Vec<Query>) -> Self {
		Self { filter: clauses, ..Self::default() }
	}

	/// Disjunction that requires at least one clause to match.
	pub fn any_of(clauses: Vec<Query>) -> Self {
		Self { should: clauses, minimum_should_match: Some(1), ..Self::default() }
	}

	fn to_value(&self) -> Value {
		let mut inner = Map::new();

		for (key, clauses) in [
			("must", &self.must),
			("filter", &self.filter),
			("should", &self.should),
			("must_not", &self.must_not),
		] {
			if !clauses.is_empty() {
				inner.insert(
					key.to_string(),
					Value::Array(clauses.iter().map(Query::to_value).collect()),
				);
			}
		}

		if let Some(minimum) = self.minimum_should_match {
			inner.insert("minimum_should_match".to_string(), Value::from(minimum));
		}

		serde_json::json!({ "bool": inner })
	}
}

/// Turns a filter parameter set into the query for one target index.
pub fn compile(routing: &RoutingTable, params: &FilterParams, index: IndexKind) -> Result<Query> {
	let mut local = Vec::new();
	let mut nested: BTreeMap<NestedPath, Vec<Query>> = BTreeMap::new();

	for (field, value) in params.filters() {
		let route = routing.route(field, index);
		let path = route.field_path(field);
		let clauses = match value {
			FilterValue::Terms(values) => vec![Query::terms(&path, values.iter().cloned())],
			FilterValue::Range(bound) => range_clauses(field, &path, *bound, params.policy(field))?,
			FilterValue::Unbounded => sentinel_clauses(&path, params.policy(field)),
		};

		if clauses.is_empty() {
			continue;
		}

		match route {
			Route::Local => local.extend(clauses),
			Route::Nested(nested_path) => nested.entry(nested_path).or_default().extend(clauses),
		}
	}

	if let Some(clause) = imported_clause(params.imported()) {
		local.push(clause);
	}

	local.extend(nest_scopes(nested));

	if local.is_empty() {
		return Ok(unconstrained(index));
	}

	Ok(match index {
		IndexKind::Files | IndexKind::FilesOverall => {
			let mut row = BoolQuery::filter(local);

			if let Some(guard) = index.completeness_guard() {
				row.must.push(Query::Exists { field: guard.to_string() });
			}

			Query::Bool(BoolQuery::any_of(vec![Query::Bool(row)]))
		},
		_ => Query::Bool(BoolQuery::filter(local)),
	})
}

/// Query matching every qualifying row of `index`.
pub fn unconstrained(index: IndexKind) -> Query {
	match index.completeness_guard() {
		Some(guard) => Query::Bool(BoolQuery {
			must: vec![Query::Exists { field: guard.to_string() }],
			..BoolQuery::default()
		}),
		None => Query::MatchAll,
	}
}

fn range_clauses(
	field: &str,
	path: &str,
	bound: RangeBound,
	policy: UnknownPolicy,
) -> Result<Vec<Query>> {
	if bound.lower.is_none() && bound.upper.is_none() {
		return Err(Error::InvalidRange { field: field.to_string() });
	}

	let range = Query::Range { field: path.to_string(), gte: bound.lower, lte: bound.upper };

	Ok(match policy {
		UnknownPolicy::Include =>
			vec![Query::Bool(BoolQuery::any_of(vec![range, Query::term(path, SENTINEL)]))],
		UnknownPolicy::Exclude => vec![range, known_only(path)],
		UnknownPolicy::Only => vec![Query::term(path, SENTINEL)],
	})
}

/// Clauses for a range field with a policy but no bounds. Including unknowns adds nothing.
fn sentinel_clauses(path: &str, policy: UnknownPolicy) -> Vec<Query> {
	match policy {
		UnknownPolicy::Include => Vec::new(),
		UnknownPolicy::Exclude => vec![known_only(path)],
		UnknownPolicy::Only => vec![Query::term(path, SENTINEL)],
	}
}

fn known_only(path: &str) -> Query {
	Query::Bool(BoolQuery {
		must: vec![Query::Exists { field: path.to_string() }],
		must_not: vec![Query::term(path, SENTINEL)],
		..BoolQuery::default()
	})
}

fn imported_clause(imported: &[ImportedStudy]) -> Option<Query> {
	if imported.is_empty() {
		return None;
	}

	let per_study = imported
		.iter()
		.map(|study| {
			Query::Bool(BoolQuery::filter(vec![
				Query::term("study_id", study.study_id.clone()),
				Query::terms("participant_id", study.participant_ids.iter().cloned()),
			]))
		})
		.collect();

	Some(Query::Bool(BoolQuery::any_of(per_study)))
}

// Child scopes are folded into their parent so a single outer nested clause holds them.
fn nest_scopes(groups: BTreeMap<NestedPath, Vec<Query>>) -> Vec<Query> {
	let mut roots: BTreeMap<NestedPath, Vec<Query>> = BTreeMap::new();
	let mut children = Vec::new();

	for (path, clauses) in groups {
		match path.parent() {
			Some(parent) => children.push((parent, path, clauses)),
			None => roots.entry(path).or_default().extend(clauses),
		}
	}
	for (parent, path, clauses) in children {
		roots.entry(parent).or_default().push(nested_scope(path, clauses));
	}

	roots.into_iter().map(|(path, clauses)| nested_scope(path, clauses)).collect()
}

fn nested_scope(path: NestedPath, clauses: Vec<Query>) -> Query {
	Query::Nested {
		path: path.as_str().to_string(),
		query: Box::new(Query::Bool(BoolQuery::filter(clauses))),
	}
}
