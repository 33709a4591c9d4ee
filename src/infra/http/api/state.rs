use std::sync::Arc;

use crate::application::analytics::AnalyticsService;
use crate::application::domains::DomainService;
use crate::application::forms::FormService;
use crate::application::public::PublicSiteService;
use crate::application::website::WebsiteService;

#[derive(Clone)]
pub struct ApiState {
    pub website: Arc<WebsiteService>,
    pub site: Arc<PublicSiteService>,
    pub forms: Arc<FormService>,
    pub domains: Arc<DomainService>,
    pub analytics: Arc<AnalyticsService>,
}
