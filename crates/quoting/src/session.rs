//! Per-interaction quote session.
//!
//! A session walks `Idle -> Resolving -> Fetching -> Ready`, or ends in
//! `Failed`. Every pair selection takes a new request sequence number; a
//! fetch that completes after a newer selection was issued is dropped
//! instead of applied.

use crate::engine::{QuoteEngine, QuoteRequest};
use oolong_data::{PoolResolver, PoolStateCache};
use oolong_domain::{Direction, PoolDescriptor, PoolState, Quote, QuoteError, Token, TokenRole};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Waiting for both tokens.
    #[default]
    Idle,
    /// Looking the pair up in the registry.
    Resolving,
    /// Waiting for the pool state.
    Fetching,
    /// A quote is available.
    Ready,
    /// The last selection failed. Only a new selection or a retry leaves it.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Fetching => "fetching",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub state: SessionState,
    /// Latest issued request sequence number.
    pub sequence: u64,
    pub from: Option<Token>,
    pub to: Option<Token>,
    pub input_amount: Decimal,
    pub leverage: Decimal,
    pub direction: Direction,
    pub pool: Option<PoolDescriptor>,
    /// State the current quote was computed from. Fees and liquidity are
    /// informational only.
    pub pool_state: Option<PoolState>,
    pub quote: Option<Quote>,
    pub last_error: Option<QuoteError>,
}

#[derive(Debug, Clone, Copy)]
struct Inputs {
    input_amount: Decimal,
    leverage: Decimal,
    direction: Direction,
}

#[derive(Debug)]
struct Inner {
    from: Option<Token>,
    to: Option<Token>,
    inputs: Inputs,
    state: SessionState,
    sequence: u64,
    pool: Option<PoolDescriptor>,
    pool_state: Option<Arc<PoolState>>,
    quote: Option<Quote>,
    last_error: Option<QuoteError>,
}

impl Inner {
    fn new() -> Self {
        Self {
            from: None,
            to: None,
            inputs: Inputs {
                input_amount: Decimal::ZERO,
                leverage: Decimal::ONE,
                direction: Direction::default(),
            },
            state: SessionState::Idle,
            sequence: 0,
            pool: None,
            pool_state: None,
            quote: None,
            last_error: None,
        }
    }

    fn fail(&mut self, error: QuoteError) {
        self.state = SessionState::Failed;
        self.quote = None;
        self.last_error = Some(error);
    }

    /// Request for the current pair, with the pool orientation taken from
    /// the current input token.
    fn request(&self, inputs: Inputs) -> Option<QuoteRequest> {
        let (from, to, pool) = (self.from.as_ref()?, self.to.as_ref()?, self.pool.as_ref()?);
        Some(QuoteRequest {
            input_token: from.clone(),
            output_token: to.clone(),
            input_amount: inputs.input_amount,
            leverage: inputs.leverage,
            direction: inputs.direction,
            reversed: !from.same_as(&pool.token0),
        })
    }
}

/// Drives resolver, cache and engine for a single user interaction.
///
/// Every operation returns the session's current quote (if any) or the
/// typed error that stopped it.
pub struct QuoteSession {
    id: Uuid,
    resolver: Arc<PoolResolver>,
    cache: Arc<PoolStateCache>,
    engine: QuoteEngine,
    inner: Mutex<Inner>,
}

impl QuoteSession {
    pub fn new(resolver: Arc<PoolResolver>, cache: Arc<PoolStateCache>, engine: QuoteEngine) -> Self {
        Self {
            id: Uuid::new_v4(),
            resolver,
            cache,
            engine,
            inner: Mutex::new(Inner::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub async fn quote(&self) -> Option<Quote> {
        self.inner.lock().await.quote.clone()
    }

    pub async fn last_error(&self) -> Option<QuoteError> {
        self.inner.lock().await.last_error.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        SessionSnapshot {
            session_id: self.id,
            state: inner.state,
            sequence: inner.sequence,
            from: inner.from.clone(),
            to: inner.to.clone(),
            input_amount: inner.inputs.input_amount,
            leverage: inner.inputs.leverage,
            direction: inner.inputs.direction,
            pool: inner.pool.clone(),
            pool_state: inner.pool_state.as_deref().cloned(),
            quote: inner.quote.clone(),
            last_error: inner.last_error.clone(),
        }
    }

    /// Sets the token for one side. Once both sides are set the pair is
    /// (re)selected, superseding any request still in flight.
    ///
    /// # Errors
    /// Returns the error that moved the session to `Failed`.
    pub async fn select_token(
        &self,
        role: TokenRole,
        token: Token,
    ) -> Result<Option<Quote>, QuoteError> {
        let mut inner = self.inner.lock().await;
        match role {
            TokenRole::From => inner.from = Some(token),
            TokenRole::To => inner.to = Some(token),
        }
        self.select_current_pair(inner).await
    }

    /// Sets both tokens and selects the pair.
    ///
    /// # Errors
    /// Returns the error that moved the session to `Failed`.
    pub async fn select_pair(&self, from: Token, to: Token) -> Result<Option<Quote>, QuoteError> {
        let mut inner = self.inner.lock().await;
        inner.from = Some(from);
        inner.to = Some(to);
        self.select_current_pair(inner).await
    }

    /// Re-runs pair selection for the current tokens with a fresh fetch.
    ///
    /// # Errors
    /// Returns the error that moved the session to `Failed`.
    pub async fn retry(&self) -> Result<Option<Quote>, QuoteError> {
        let inner = self.inner.lock().await;
        self.select_current_pair(inner).await
    }

    /// Updates the input amount, recomputing the quote when ready.
    ///
    /// # Errors
    /// Returns the computation error; the session keeps its previous input
    /// and quote.
    pub async fn set_input_amount(&self, amount: Decimal) -> Result<Option<Quote>, QuoteError> {
        let mut inner = self.inner.lock().await;
        let next = Inputs {
            input_amount: amount,
            ..inner.inputs
        };
        self.apply_inputs(&mut inner, next)
    }

    /// Updates the leverage, recomputing the quote when ready.
    ///
    /// # Errors
    /// Returns [`QuoteError::Range`] for out-of-bounds leverage; the session
    /// keeps its previous leverage and quote.
    pub async fn set_leverage(&self, leverage: Decimal) -> Result<Option<Quote>, QuoteError> {
        self.engine.check_leverage(leverage)?;
        let mut inner = self.inner.lock().await;
        let next = Inputs {
            leverage,
            ..inner.inputs
        };
        self.apply_inputs(&mut inner, next)
    }

    /// Sets the trade side. The amounts are unaffected.
    ///
    /// # Errors
    /// Returns the computation error; the session is left unchanged.
    pub async fn set_direction(&self, direction: Direction) -> Result<Option<Quote>, QuoteError> {
        let mut inner = self.inner.lock().await;
        let next = Inputs {
            direction,
            ..inner.inputs
        };
        self.apply_inputs(&mut inner, next)
    }

    /// Swaps input and output tokens. When ready, the previous output becomes
    /// the new input amount and the quote is inverted without refetching.
    ///
    /// # Errors
    /// Returns the computation error; the session is left unchanged.
    pub async fn swap_direction(&self) -> Result<Option<Quote>, QuoteError> {
        let mut inner = self.inner.lock().await;

        if inner.state == SessionState::Ready
            && let (Some(quote), Some(state)) = (inner.quote.as_ref(), inner.pool_state.as_ref())
        {
            let inverted = self.engine.invert(quote, state)?;
            inner.inputs.input_amount = inverted.input_amount;
            inner.from = Some(inverted.input_token.clone());
            inner.to = Some(inverted.output_token.clone());
            inner.quote = Some(inverted.clone());
            debug!(
                session_id = %self.id,
                input = %inverted.input_amount,
                output = %inverted.output_amount,
                "Swapped quote direction"
            );
            return Ok(Some(inverted));
        }

        // Not ready: an in-flight fetch orients itself from the swapped tokens.
        let Inner { from, to, .. } = &mut *inner;
        std::mem::swap(from, to);
        Ok(inner.quote.clone())
    }

    fn apply_inputs(&self, inner: &mut Inner, next: Inputs) -> Result<Option<Quote>, QuoteError> {
        if inner.state != SessionState::Ready {
            inner.inputs = next;
            return Ok(inner.quote.clone());
        }
        let (Some(request), Some(state)) = (inner.request(next), inner.pool_state.clone()) else {
            inner.inputs = next;
            return Ok(inner.quote.clone());
        };
        let quote = self.engine.quote(&state, &request)?;
        debug!(
            session_id = %self.id,
            input = %quote.input_amount,
            leverage = %quote.leverage,
            output = %quote.output_amount,
            "Recomputed quote"
        );
        inner.inputs = next;
        inner.quote = Some(quote.clone());
        Ok(Some(quote))
    }

    /// Starts a selection for the tokens in `inner`. The sequence number is
    /// taken under the same lock that updated the tokens.
    async fn select_current_pair(
        &self,
        mut inner: MutexGuard<'_, Inner>,
    ) -> Result<Option<Quote>, QuoteError> {
        let (sequence, pool_id) = {
            let (Some(from), Some(to)) = (inner.from.clone(), inner.to.clone()) else {
                return Ok(None);
            };

            inner.sequence += 1;
            let sequence = inner.sequence;
            inner.state = SessionState::Resolving;
            inner.pool = None;
            inner.pool_state = None;
            inner.quote = None;
            inner.last_error = None;
            info!(
                session_id = %self.id,
                sequence,
                from = %from.symbol,
                to = %to.symbol,
                "Selecting pair"
            );

            match self.resolver.resolve(&from, &to) {
                Ok(resolution) => {
                    let pool_id = resolution.pool.id;
                    inner.pool = Some(resolution.pool);
                    inner.state = SessionState::Fetching;
                    (sequence, pool_id)
                }
                Err(e) => {
                    warn!(session_id = %self.id, sequence, error = %e, "Pair resolution failed");
                    inner.fail(e.clone());
                    return Err(e);
                }
            }
        };
        drop(inner);

        let fetched = self.cache.refresh(&pool_id).await;

        let mut inner = self.inner.lock().await;
        if inner.sequence != sequence {
            debug!(
                session_id = %self.id,
                sequence,
                latest = inner.sequence,
                pool_id = %pool_id,
                "Discarding superseded pool state"
            );
            return Ok(inner.quote.clone());
        }

        let state = match fetched {
            Ok(state) => state,
            Err(e) => {
                let e = QuoteError::from(e);
                warn!(session_id = %self.id, sequence, pool_id = %pool_id, error = %e, "Pool state fetch failed");
                inner.fail(e.clone());
                return Err(e);
            }
        };
        // The latest selection always has both tokens and a pool.
        let Some(request) = inner.request(inner.inputs) else {
            return Ok(inner.quote.clone());
        };

        match self.engine.quote(&state, &request) {
            Ok(quote) => {
                info!(
                    session_id = %self.id,
                    sequence,
                    pool_id = %pool_id,
                    output = %quote.output_amount,
                    reversed = quote.reversed,
                    "Quote ready"
                );
                inner.pool_state = Some(state);
                inner.quote = Some(quote.clone());
                inner.state = SessionState::Ready;
                Ok(Some(quote))
            }
            Err(e) => {
                warn!(session_id = %self.id, sequence, pool_id = %pool_id, error = %e, "Quote failed");
                inner.fail(e.clone());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use oolong_data::CacheConfig;
    use oolong_domain::{FetchError, PoolId, SqrtPriceX96};
    use oolong_protocols::PoolStateProvider;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::time::Duration;

    const ETH_USDC: PoolId = PoolId::new([1; 32]);
    const ETH_DAI: PoolId = PoolId::new([2; 32]);

    fn eth() -> Token {
        Token::new("0x0000000000000000000000000000000000000000", "ETH", "Ether")
    }

    fn usdc() -> Token {
        Token::new("0x036cbd53842c5426634e7929541ec2318f3dcf7e", "USDC", "USD Coin")
    }

    fn dai() -> Token {
        Token::new("0x50c5725949a6f0c72e6c4a641f24049a917db0cb", "DAI", "Dai")
    }

    /// Serves fixed states per pool after a per-pool delay. Pools without a
    /// configured state fail.
    struct FakeProvider {
        pools: HashMap<PoolId, (SqrtPriceX96, Duration)>,
    }

    #[async_trait]
    impl PoolStateProvider for FakeProvider {
        async fn fetch_pool_state(&self, pool_id: &PoolId) -> Result<PoolState, FetchError> {
            let Some((sqrt, delay)) = self.pools.get(pool_id).copied() else {
                return Err(FetchError::network("pool unavailable"));
            };
            tokio::time::sleep(delay).await;
            PoolState::new(sqrt, 0, 0, 500, 1_000_000)
        }
    }

    fn session_with(pools: HashMap<PoolId, (SqrtPriceX96, Duration)>) -> (QuoteSession, Arc<PoolStateCache>) {
        let resolver = PoolResolver::new(
            vec![eth(), usdc(), dai()],
            vec![
                PoolDescriptor::new(ETH_USDC, usdc(), eth()),
                PoolDescriptor::new(ETH_DAI, eth(), dai()),
            ],
        );
        let cache = Arc::new(PoolStateCache::new(
            Arc::new(FakeProvider { pools }),
            CacheConfig::default(),
        ));
        let session = QuoteSession::new(Arc::new(resolver), cache.clone(), QuoteEngine::default());
        (session, cache)
    }

    fn default_session() -> (QuoteSession, Arc<PoolStateCache>) {
        session_with(HashMap::from([
            (ETH_USDC, (SqrtPriceX96::from(2u128 << 96), Duration::ZERO)),
            (ETH_DAI, (SqrtPriceX96::q96(), Duration::ZERO)),
        ]))
    }

    #[tokio::test]
    async fn test_ready_after_both_tokens() {
        let (session, cache) = default_session();
        assert_eq!(session.state().await, SessionState::Idle);

        session.set_input_amount(dec!(100)).await.unwrap();
        session.set_leverage(dec!(2)).await.unwrap();
        assert_eq!(session.select_token(TokenRole::From, eth()).await.unwrap(), None);
        assert_eq!(session.state().await, SessionState::Idle);

        let quote = session
            .select_token(TokenRole::To, usdc())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.state().await, SessionState::Ready);
        assert!(!quote.reversed);
        assert_eq!(quote.effective_price.value, dec!(4));
        assert_eq!(quote.output_amount.to_string(), "800.0000");
        assert_eq!(cache.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_reversed_orientation() {
        let (session, _) = default_session();
        session.set_input_amount(dec!(100)).await.unwrap();

        let quote = session.select_pair(usdc(), eth()).await.unwrap().unwrap();
        assert!(quote.reversed);
        assert_eq!(quote.effective_price.value, dec!(0.25));
        assert_eq!(quote.output_amount, dec!(25));
    }

    #[tokio::test]
    async fn test_unknown_pair_fails_without_quote() {
        let (session, cache) = default_session();

        let err = session.select_pair(usdc(), dai()).await.unwrap_err();
        assert!(matches!(err, QuoteError::NotFound { .. }));
        assert_eq!(session.state().await, SessionState::Failed);
        assert!(session.quote().await.is_none());
        assert_eq!(session.last_error().await, Some(err));
        assert_eq!(cache.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_same_token_is_invalid_pair() {
        let (session, _) = default_session();

        let err = session.select_pair(eth(), eth()).await.unwrap_err();
        assert!(matches!(err, QuoteError::InvalidPair(_)));
        assert_eq!(session.state().await, SessionState::Failed);
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_session() {
        let (session, _) = session_with(HashMap::new());

        let err = session.select_pair(eth(), usdc()).await.unwrap_err();
        assert_eq!(err, QuoteError::Fetch(FetchError::network("pool unavailable")));
        assert_eq!(session.state().await, SessionState::Failed);
        assert!(session.quote().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_fetch_is_discarded() {
        let (session, cache) = session_with(HashMap::from([
            (ETH_USDC, (SqrtPriceX96::from(2u128 << 96), Duration::from_millis(300))),
            (ETH_DAI, (SqrtPriceX96::q96(), Duration::ZERO)),
        ]));
        session.set_input_amount(dec!(10)).await.unwrap();

        let (slow, fast) = tokio::join!(session.select_pair(eth(), usdc()), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            session.select_pair(eth(), dai()).await
        });

        let fast = fast.unwrap().unwrap();
        assert_eq!(fast.output_token, dai());
        assert_eq!(fast.output_amount, dec!(10));
        // The slow call reports the session's current quote, not its own.
        assert_eq!(slow.unwrap(), Some(fast.clone()));

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.state, SessionState::Ready);
        assert_eq!(snapshot.sequence, 2);
        assert_eq!(snapshot.pool.map(|p| p.id), Some(ETH_DAI));
        assert_eq!(snapshot.quote, Some(fast));
        assert_eq!(cache.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_input_changes_do_not_refetch() {
        let (session, cache) = default_session();
        session.select_pair(eth(), usdc()).await.unwrap();

        let quote = session.set_input_amount(dec!(1.5)).await.unwrap().unwrap();
        assert_eq!(quote.output_amount, dec!(6));

        let quote = session.set_leverage(dec!(5)).await.unwrap().unwrap();
        assert_eq!(quote.output_amount, dec!(30));

        let quote = session.set_input_amount(dec!(0)).await.unwrap().unwrap();
        assert!(quote.output_amount.is_zero());

        assert_eq!(session.state().await, SessionState::Ready);
        assert_eq!(cache.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_leverage_keeps_quote() {
        let (session, _) = default_session();
        session.set_input_amount(dec!(1)).await.unwrap();
        let before = session.select_pair(eth(), usdc()).await.unwrap();

        let err = session.set_leverage(dec!(5.5)).await.unwrap_err();
        assert!(matches!(err, QuoteError::Range { .. }));
        assert_eq!(session.state().await, SessionState::Ready);
        assert_eq!(session.quote().await, before);
        assert_eq!(session.snapshot().await.leverage, dec!(1));
    }

    #[tokio::test]
    async fn test_swap_direction_inverts_quote() {
        let (session, cache) = default_session();
        session.set_input_amount(dec!(10)).await.unwrap();
        session.select_pair(eth(), usdc()).await.unwrap();

        let swapped = session.swap_direction().await.unwrap().unwrap();
        assert_eq!(swapped.input_token, usdc());
        assert_eq!(swapped.output_token, eth());
        assert_eq!(swapped.input_amount, dec!(40));
        assert_eq!(swapped.output_amount, dec!(10));
        assert!(swapped.reversed);

        let back = session.swap_direction().await.unwrap().unwrap();
        assert_eq!(back.output_amount, dec!(40));
        assert!(!back.reversed);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.from, Some(eth()));
        assert_eq!(snapshot.input_amount, dec!(10));
        assert_eq!(cache.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_swap_before_ready_swaps_tokens() {
        let (session, _) = default_session();
        session.select_token(TokenRole::From, eth()).await.unwrap();
        assert_eq!(session.swap_direction().await.unwrap(), None);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.from, None);
        assert_eq!(snapshot.to, Some(eth()));
    }

    #[tokio::test]
    async fn test_set_direction_recomputes() {
        let (session, _) = default_session();
        session.set_input_amount(dec!(1)).await.unwrap();
        session.select_pair(eth(), usdc()).await.unwrap();

        let quote = session
            .set_direction(Direction::Short)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(quote.direction, Direction::Short);
        assert_eq!(quote.output_amount, dec!(4));
    }

    #[tokio::test]
    async fn test_retry_refetches() {
        let (session, cache) = default_session();
        assert_eq!(session.retry().await.unwrap(), None);

        session.select_pair(eth(), dai()).await.unwrap();
        session.retry().await.unwrap();
        assert_eq!(session.state().await, SessionState::Ready);
        assert_eq!(session.snapshot().await.sequence, 2);
        assert_eq!(cache.fetch_count(), 2);
    }
}
