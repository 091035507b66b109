//! proto 與計算核心型別之間的轉換

use tonic::Status;

use crate::calc::{
    AdapterError, BoxInput, CalculationResult, CardInput, DetailedExpectation, DuplicatePolicy,
    PreparedBox, RarityBreakdown, RarityRef, RaritySetting, SimulationError, SimulationProgress,
};
use crate::proto;
use crate::proto::simulate_event::Event;

fn card_input(card: proto::PricedCard) -> CardInput {
    CardInput {
        id: card.id,
        rarity: RarityRef::Name(card.rarity),
        price: card.price,
        reference_price: Some(card.reference_price),
    }
}

fn rarity_setting(setting: proto::RaritySetting) -> RaritySetting {
    RaritySetting {
        name: setting.rarity,
        cards_per_box: setting.cards_per_box,
        allows_duplicates: setting.allows_duplicates,
        total_types: setting.total_types,
    }
}

/// 將請求內容正規化為引擎輸入
pub fn prepare_box(
    box_price: f64,
    cards: Vec<proto::PricedCard>,
    rarities: Vec<proto::RaritySetting>,
    policy: &DuplicatePolicy,
) -> Result<PreparedBox, AdapterError> {
    BoxInput {
        box_price,
        rarities: rarities.into_iter().map(rarity_setting).collect(),
        cards: cards.into_iter().map(card_input).collect(),
    }
    .prepare(policy)
}

fn breakdown(entry: &RarityBreakdown) -> proto::RarityBreakdown {
    proto::RarityBreakdown {
        rarity: entry.rarity_name.clone(),
        expected_value: entry.expected_value,
        contribution_percent: entry.contribution_percent,
        card_count: saturating_u32(entry.card_count),
    }
}

pub fn calculate_response(result: &CalculationResult, cached: bool) -> proto::CalculateResponse {
    proto::CalculateResponse {
        expected_value: result.expected_value,
        plus_probability: result.plus_probability,
        breakdown: result.breakdown.iter().map(breakdown).collect(),
        cached,
    }
}

pub fn progress_event(progress: SimulationProgress) -> proto::SimulateEvent {
    proto::SimulateEvent {
        event: Some(Event::Progress(proto::SimulationProgress {
            completed: saturating_u32(progress.completed),
            total: saturating_u32(progress.total),
        })),
    }
}

pub fn result_event(result: &DetailedExpectation) -> proto::SimulateEvent {
    proto::SimulateEvent {
        event: Some(Event::Result(proto::SimulationResult {
            expected_value: result.expected_value,
            plus_probability: result.plus_probability,
            distribution: result
                .distribution
                .iter()
                .map(|bin| proto::HistogramBin {
                    value: bin.value,
                    frequency: bin.frequency,
                })
                .collect(),
            simulations: saturating_u32(result.simulations),
            seed: result.seed.unwrap_or_default(),
        })),
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl From<AdapterError> for Status {
    fn from(err: AdapterError) -> Self {
        Status::invalid_argument(err.to_string())
    }
}

impl From<SimulationError> for Status {
    fn from(err: SimulationError) -> Self {
        match err {
            SimulationError::Cancelled { .. } => Status::cancelled(err.to_string()),
            SimulationError::InvalidOptions(_) => Status::internal(err.to_string()),
        }
    }
}
