//! Weighted relevance scoring of listings against a reference listing.
//!
//! The ranker is pure. It turns a reference [`ListingDocument`] into a [`ScoringSpec`] (one
//! weighted condition per shared attribute) and then into a [`ScoringRequest`] that any
//! [`SecondaryIndex`](crate::SecondaryIndex) can evaluate.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::index::ListingDocument;
use rental_config::{SimilarRanking, SimilarWeights};

/// How matched boost weights combine into the function score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMode {
	#[default]
	Sum,
	Multiply,
}

/// How the function score combines with the index's own relevance score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostMode {
	#[default]
	Replace,
	Sum,
	Multiply,
}

/// A condition over one document field.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexCondition {
	Keyword { field: &'static str, value: String },
	Flag { field: &'static str, value: bool },
	/// Bounds are inclusive unless marked exclusive.
	Range { field: &'static str, gt: Option<f64>, gte: Option<f64>, lte: Option<f64> },
}
impl IndexCondition {
	pub fn field(&self) -> &'static str {
		match self {
			Self::Keyword { field, .. }
			| Self::Flag { field, .. }
			| Self::Range { field, .. } => field,
		}
	}

	pub fn matches(&self, doc: &ListingDocument) -> bool {
		match self {
			Self::Keyword { field, value } => doc.keyword(field).is_some_and(|found| found == *value),
			Self::Flag { field, value } => doc.flag(field) == Some(*value),
			Self::Range { field, gt, gte, lte } => doc.number(field).is_some_and(|found| {
				gt.is_none_or(|bound| found > bound)
					&& gte.is_none_or(|bound| found >= bound)
					&& lte.is_none_or(|bound| found <= bound)
			}),
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeightedBoost {
	pub factor: &'static str,
	pub condition: IndexCondition,
	pub weight: f32,
}

/// The reference listing's attributes, each bound to a weight. Built per call.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoringSpec {
	pub reference_id: Uuid,
	pub factors: Vec<WeightedBoost>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoringRequest {
	pub must: Vec<IndexCondition>,
	pub must_not: Vec<IndexCondition>,
	pub boosts: Vec<WeightedBoost>,
	pub score_mode: ScoreMode,
	pub boost_mode: BoostMode,
	pub limit: usize,
}
impl ScoringRequest {
	pub fn is_eligible(&self, doc: &ListingDocument) -> bool {
		self.must.iter().all(|condition| condition.matches(doc))
			&& !self.must_not.iter().any(|condition| condition.matches(doc))
	}

	/// Function score combined with `base` according to the boost mode.
	pub fn score(&self, doc: &ListingDocument, base: f32) -> f32 {
		let matched = self.boosts.iter().filter(|boost| boost.condition.matches(doc));
		let function_score = match self.score_mode {
			ScoreMode::Sum => matched.map(|boost| boost.weight).sum(),
			ScoreMode::Multiply => {
				let mut any = false;
				let product = matched.fold(1.0_f32, |acc, boost| {
					any = true;

					acc * boost.weight
				});

				if any { product } else { 0.0 }
			},
		};

		match self.boost_mode {
			BoostMode::Replace => function_score,
			BoostMode::Sum => base + function_score,
			BoostMode::Multiply => base * function_score,
		}
	}

	/// Filters, scores and orders `candidates` (document plus index score).
	pub fn rank<I>(&self, candidates: I) -> Vec<RankedListing>
	where
		I: IntoIterator<Item = (ListingDocument, f32)>,
	{
		let mut ranked: Vec<RankedListing> = candidates
			.into_iter()
			.filter(|(doc, _)| self.is_eligible(doc))
			.map(|(doc, base)| RankedListing { listing_id: doc.listing_id, score: self.score(&doc, base) })
			.collect();

		self.keep_best(&mut ranked);

		ranked
	}

	/// Orders best first, listing id breaking ties, and drops everything past the limit.
	pub fn keep_best(&self, ranked: &mut Vec<RankedListing>) {
		ranked.sort_by(|a, b| {
			b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then(a.listing_id.cmp(&b.listing_id))
		});
		ranked.truncate(self.limit);
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedListing {
	pub listing_id: Uuid,
	pub score: f32,
}

#[derive(Clone, Debug)]
pub struct RelevanceRanker {
	price_band_ratio: f64,
	area_band_ratio: f64,
	weights: [(&'static str, f32); 7],
}
impl RelevanceRanker {
	pub fn new(cfg: &SimilarRanking) -> Self {
		Self {
			price_band_ratio: cfg.price_band_ratio,
			area_band_ratio: cfg.area_band_ratio,
			weights: weights(&cfg.weights),
		}
	}

	/// One factor per attribute the reference carries. Zero weights and blank locale fields
	/// are left out.
	pub fn spec(&self, reference: &ListingDocument) -> ScoringSpec {
		let mut factors = Vec::new();

		for (factor, weight) in self.weights {
			if weight <= 0.0 {
				continue;
			}

			let Some(condition) = self.condition(factor, reference) else {
				continue;
			};

			factors.push(WeightedBoost { factor, condition, weight });
		}

		ScoringSpec { reference_id: reference.listing_id, factors }
	}

	/// Only active listings that have not expired at `now` are eligible, never the reference.
	pub fn request(&self, spec: ScoringSpec, limit: usize, now: OffsetDateTime) -> ScoringRequest {
		ScoringRequest {
			must: vec![
				IndexCondition::Flag { field: "active", value: true },
				IndexCondition::Range {
					field: "expires_at",
					gt: Some(now.unix_timestamp() as f64),
					gte: None,
					lte: None,
				},
			],
			must_not: vec![IndexCondition::Keyword {
				field: "listing_id",
				value: spec.reference_id.to_string(),
			}],
			boosts: spec.factors,
			score_mode: ScoreMode::Sum,
			boost_mode: BoostMode::Replace,
			limit,
		}
	}

	fn condition(&self, factor: &str, reference: &ListingDocument) -> Option<IndexCondition> {
		let keyword = |field: &'static str, value: &str| {
			let value = value.trim();

			(!value.is_empty()).then(|| IndexCondition::Keyword { field, value: value.to_string() })
		};

		match factor {
			"price" => Some(band("price", reference.price as f64, self.price_band_ratio)),
			"city" => keyword("city", &reference.city),
			"district" => keyword("district", &reference.district),
			"ward" => keyword("ward", &reference.ward),
			"property_type" => keyword("building_type", &reference.building_type),
			"area" => Some(band("area", reference.area, self.area_band_ratio)),
			"bedrooms" => Some(IndexCondition::Range {
				field: "bedrooms",
				gt: None,
				gte: Some(reference.bedrooms as f64),
				lte: None,
			}),
			_ => None,
		}
	}
}

fn band(field: &'static str, center: f64, ratio: f64) -> IndexCondition {
	let half_width = center.abs() * ratio;

	IndexCondition::Range {
		field,
		gt: None,
		gte: Some(center - half_width),
		lte: Some(center + half_width),
	}
}

fn weights(cfg: &SimilarWeights) -> [(&'static str, f32); 7] {
	let mut out = [("", 0.0); 7];

	for (slot, pair) in out.iter_mut().zip(cfg.iter()) {
		*slot = pair;
	}

	out
}
