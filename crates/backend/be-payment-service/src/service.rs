use std::sync::Arc;

use be_auth_core::JwtConfig;

use crate::checkout::CheckoutInitiator;
use crate::config::PaymentConfig;
use crate::ledger::PaymentLedger;
use crate::provider::CheckoutProvider;
use crate::reconcile::Reconciler;

pub struct AppState<P, L> {
    pub config: PaymentConfig,
    pub checkout: CheckoutInitiator<P>,
    pub reconciler: Reconciler<P, L>,
    pub ledger: Arc<L>,
    pub jwt_config: Arc<JwtConfig>,
}

impl<P: CheckoutProvider, L: PaymentLedger> AppState<P, L> {
    pub fn new(
        config: PaymentConfig,
        provider: Arc<P>,
        ledger: Arc<L>,
        jwt_config: Arc<JwtConfig>,
    ) -> Self {
        Self {
            checkout: CheckoutInitiator::new(provider.clone(), &config),
            reconciler: Reconciler::new(provider, ledger.clone()),
            config,
            ledger,
            jwt_config,
        }
    }
}
