use crate::admission::AdmissionController;
use crate::introspection::IntrospectionGateway;
use crate::policy::TenantPolicyProvider;
use crate::submission::SubmissionSink;
use crate::visitor::VisitorStore;
use std::sync::Arc;

// app's shared state
pub struct AppState {
    pub policies: Arc<dyn TenantPolicyProvider>,
    pub admission: AdmissionController,
    pub introspection: IntrospectionGateway,
    pub sink: Arc<dyn SubmissionSink>,
    pub admin_token: Option<String>, // admin routes refuse everyone when unset
}

impl AppState {
    // Wire the admission core around one store owned by the caller
    pub fn new(
        store: Arc<VisitorStore>,
        policies: Arc<dyn TenantPolicyProvider>,
        sink: Arc<dyn SubmissionSink>,
        admin_token: Option<String>,
    ) -> Self {
        Self {
            policies,
            admission: AdmissionController::new(Arc::clone(&store)),
            introspection: IntrospectionGateway::new(store),
            sink,
            admin_token,
        }
    }
}
