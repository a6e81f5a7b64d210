use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A categorical filter dimension over the clause corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Facet {
	#[serde(rename = "lob")]
	LineOfBusiness,
	#[serde(rename = "state")]
	Jurisdiction,
	#[serde(rename = "version")]
	DocumentVersion,
}
impl Facet {
	pub const ALL: [Facet; 3] = [Facet::LineOfBusiness, Facet::Jurisdiction, Facet::DocumentVersion];

	pub fn key(self) -> &'static str {
		match self {
			Self::LineOfBusiness => "lob",
			Self::Jurisdiction => "state",
			Self::DocumentVersion => "version",
		}
	}

	pub fn from_key(raw: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|facet| facet.key().eq_ignore_ascii_case(raw.trim()))
	}
}

/// One projected row of the corpus metadata. Any column may be missing.
#[derive(Debug, Clone, Default)]
pub struct FacetRow {
	pub lob: Option<String>,
	pub state: Option<String>,
	pub version: Option<String>,
}

/// Distinct legal values per facet, sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FacetCatalog {
	values: BTreeMap<Facet, BTreeSet<String>>,
}
impl FacetCatalog {
	/// Builds the catalog, dropping null and blank values.
	pub fn from_rows<I>(rows: I) -> Self
	where
		I: IntoIterator<Item = FacetRow>,
	{
		let mut values =
			Facet::ALL.into_iter().map(|facet| (facet, BTreeSet::new())).collect::<BTreeMap<_, _>>();

		for row in rows {
			for (facet, value) in [
				(Facet::LineOfBusiness, row.lob),
				(Facet::Jurisdiction, row.state),
				(Facet::DocumentVersion, row.version),
			] {
				let Some(value) = value else {
					continue;
				};
				let trimmed = value.trim();

				if trimmed.is_empty() {
					continue;
				}

				values.entry(facet).or_default().insert(trimmed.to_string());
			}
		}

		Self { values }
	}

	pub fn values(&self, facet: Facet) -> impl Iterator<Item = &str> {
		self.values.get(&facet).into_iter().flat_map(|set| set.iter().map(String::as_str))
	}

	pub fn contains(&self, facet: Facet, value: &str) -> bool {
		self.values.get(&facet).map(|set| set.contains(value)).unwrap_or(false)
	}

	/// Selectable options for a facet: the unconstrained sentinel first, then the legal values.
	pub fn options(&self, facet: Facet, sentinel: &str) -> Vec<String> {
		std::iter::once(sentinel.to_string())
			.chain(self.values(facet).map(str::to_string))
			.collect()
	}
}
