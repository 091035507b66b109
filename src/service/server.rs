//! gRPC 服務實作

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use crate::calc::{
    calculate_box_expectation, run_simulation, DuplicatePolicy, ProfitThresholds, SimulationError,
    SimulationPlan,
};
use crate::proto::box_ev_server::{BoxEv, BoxEvServer};
use crate::proto::{
    CalculateRequest, CalculateResponse, ClassifyRarityRequest, ClassifyRarityResponse,
    InvalidateBoxRequest, InvalidateBoxResponse, SimulateEvent, SimulateRequest,
};

use super::cache::{CacheKey, ExpectationCache};
use super::config::{ConfigError, ServiceConfig};
use super::convert;

/// 模擬進度串流的緩衝大小
const PROGRESS_BUFFER: usize = 16;

pub struct BoxEvService {
    config: ServiceConfig,
    policy: DuplicatePolicy,
    thresholds: ProfitThresholds,
    cache: Arc<ExpectationCache>,
}

impl BoxEvService {
    pub fn new(config: ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let thresholds = config.thresholds()?;
        Ok(Self {
            policy: config.duplicate_policy(),
            cache: Arc::new(ExpectationCache::new(config.cache_ttl())),
            thresholds,
            config,
        })
    }

    /// 快取的共享參照（供定期清理使用）
    pub fn cache(&self) -> Arc<ExpectationCache> {
        Arc::clone(&self.cache)
    }

    pub fn into_server(self) -> BoxEvServer<Self> {
        BoxEvServer::new(self)
    }
}

#[tonic::async_trait]
impl BoxEv for BoxEvService {
    async fn calculate(
        &self,
        request: Request<CalculateRequest>,
    ) -> Result<Response<CalculateResponse>, Status> {
        let CalculateRequest {
            box_id,
            box_price,
            cards,
            rarities,
        } = request.into_inner();
        let prepared = convert::prepare_box(box_price, cards, rarities, &self.policy)?;

        let key = CacheKey::new(&box_id, &prepared);
        if let Some(result) = self.cache.get(&key, &prepared) {
            debug!(box_id = %box_id, "expectation cache hit");
            return Ok(Response::new(convert::calculate_response(&result, true)));
        }

        let result = calculate_box_expectation(
            &prepared.cards,
            &prepared.composition,
            prepared.box_price,
            &self.thresholds,
        );
        info!(
            target: "box_ev::audit",
            box_id = %box_id,
            box_price = prepared.box_price,
            expected_value = result.expected_value,
            plus_probability = result.plus_probability,
            "box expectation calculated"
        );

        let response = convert::calculate_response(&result, false);
        self.cache.insert(key, prepared, result);
        Ok(Response::new(response))
    }

    type SimulateStream = ReceiverStream<Result<SimulateEvent, Status>>;

    async fn simulate(
        &self,
        request: Request<SimulateRequest>,
    ) -> Result<Response<Self::SimulateStream>, Status> {
        let SimulateRequest {
            box_id,
            box_price,
            cards,
            rarities,
            simulations,
            seed,
        } = request.into_inner();
        let prepared = convert::prepare_box(box_price, cards, rarities, &self.policy)?;
        let options = self.config.simulation_options(simulations as usize, seed);
        let plan = SimulationPlan::new(&prepared.cards, &prepared.composition);
        let box_price = prepared.box_price;

        info!(
            box_id = %box_id,
            simulations = options.simulations,
            rarities = plan.rarity_count(),
            "simulation started"
        );

        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
        tokio::task::spawn_blocking(move || {
            // 客戶端關閉串流後送出失敗 → 取消模擬
            let outcome = run_simulation(&plan, &options, box_price, |progress| {
                match tx.blocking_send(Ok(convert::progress_event(progress))) {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(_) => ControlFlow::Break(()),
                }
            });

            match outcome {
                Ok(result) => {
                    info!(
                        target: "box_ev::audit",
                        box_id = %box_id,
                        box_price,
                        expected_value = result.expected_value,
                        plus_probability = result.plus_probability,
                        simulations = result.simulations,
                        "box simulation finished"
                    );
                    let _ = tx.blocking_send(Ok(convert::result_event(&result)));
                }
                Err(SimulationError::Cancelled { completed, total }) => {
                    warn!(box_id = %box_id, completed, total, "simulation cancelled by client");
                }
                Err(err) => {
                    let _ = tx.blocking_send(Err(Status::from(err)));
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn classify_rarity(
        &self,
        request: Request<ClassifyRarityRequest>,
    ) -> Result<Response<ClassifyRarityResponse>, Status> {
        let rarity = request.into_inner().rarity;
        Ok(Response::new(ClassifyRarityResponse {
            allows_duplicates: self.policy.allows_duplicates(&rarity),
        }))
    }

    async fn invalidate_box(
        &self,
        request: Request<InvalidateBoxRequest>,
    ) -> Result<Response<InvalidateBoxResponse>, Status> {
        let box_id = request.into_inner().box_id;
        let removed = self.cache.invalidate_box(&box_id);
        debug!(box_id = %box_id, removed, "box cache invalidated");
        Ok(Response::new(InvalidateBoxResponse {
            removed: u32::try_from(removed).unwrap_or(u32::MAX),
        }))
    }
}
