use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Guards the event bus. It never retries anything: it only decides whether
// the next single attempt is made at all.
//
// States:
// - Closed:   attempts pass through
// - Open:     attempts are refused until `open_for` has elapsed
// - HalfOpen: attempts pass through; `success_threshold` successes close it,
//             one failure reopens it
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding: 0=Closed, 1=Open, 2=HalfOpen
    pub fn as_gauge(self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial attempt
    pub open_for: Duration,
    /// Successes in half-open needed to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_for: Duration::from_secs(30),
            success_threshold: 3,
        }
    }
}

#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    CircuitOpen,
    OperationFailed(E),
}

impl<E: fmt::Display> fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitBreakerError::CircuitOpen => write!(f, "Circuit breaker is open"),
            CircuitBreakerError::OperationFailed(e) => write!(f, "Operation failed: {}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for CircuitBreakerError<E> {}

struct Tally {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

impl Tally {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            opened_at: None,
        }
    }

    fn trip(&mut self) {
        self.state = CircuitState::Open;
        self.half_open_successes = 0;
        self.opened_at = Some(Instant::now());
    }
}

#[derive(Clone)]
pub struct CircuitBreaker {
    tally: Arc<Mutex<Tally>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            tally: Arc::new(Mutex::new(Tally::closed())),
            config,
        }
    }

    /// Run `operation` unless the circuit is open
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        if !self.admit().await {
            return Err(CircuitBreakerError::CircuitOpen);
        }

        let result = operation.await;
        self.record(result.is_ok()).await;
        result.map_err(CircuitBreakerError::OperationFailed)
    }

    async fn admit(&self) -> bool {
        let mut tally = self.tally.lock().await;
        if tally.state != CircuitState::Open {
            return true;
        }

        let cooled_down = tally
            .opened_at
            .map_or(true, |at| at.elapsed() >= self.config.open_for);
        if cooled_down {
            tracing::info!("Circuit breaker half-open, allowing a trial attempt");
            tally.state = CircuitState::HalfOpen;
            tally.half_open_successes = 0;
        }
        cooled_down
    }

    async fn record(&self, success: bool) {
        let mut tally = self.tally.lock().await;

        match (tally.state, success) {
            (CircuitState::Closed, true) => tally.consecutive_failures = 0,
            (CircuitState::Closed, false) => {
                tally.consecutive_failures += 1;
                if tally.consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        failures = tally.consecutive_failures,
                        "Circuit breaker opening"
                    );
                    tally.trip();
                }
            }
            (CircuitState::HalfOpen, true) => {
                tally.half_open_successes += 1;
                if tally.half_open_successes >= self.config.success_threshold {
                    tracing::info!("Circuit breaker closed after recovery");
                    *tally = Tally::closed();
                }
            }
            (CircuitState::HalfOpen, false) => {
                tracing::warn!("Trial attempt failed, reopening circuit");
                tally.trip();
            }
            // An attempt admitted before another caller tripped the circuit
            (CircuitState::Open, _) => {}
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.tally.lock().await.state
    }
}
