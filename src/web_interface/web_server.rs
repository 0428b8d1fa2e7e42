use log::info;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use warp::{Filter, Rejection, Reply};

use super::routes::{
    get_service_route, list_services_route, start_service_route, stop_service_route,
};
use crate::error_handling::types::WebError;
use crate::service_management::control::ServiceControl;

/// HTTP control surface for provider services
pub struct WebServer {
    control: Arc<ServiceControl>,
}

impl WebServer {
    pub fn new(control: Arc<ServiceControl>) -> Self {
        Self { control }
    }

    /// Every route of the API, composed.
    pub fn routes(&self) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
        list_services_route(self.control.clone())
            .or(get_service_route(self.control.clone()))
            .or(start_service_route(self.control.clone()))
            .or(stop_service_route(self.control.clone()))
    }

    /// Serves the API until the returned future is dropped.
    pub async fn start(&self, bind_address: &str, port: u16) -> Result<(), WebError> {
        let ip: IpAddr = bind_address
            .parse()
            .map_err(|_| WebError::BadAddress(bind_address.to_string()))?;
        let addr = SocketAddr::new(ip, port);

        info!("Web API listening on http://{}", addr);
        warp::serve(self.routes()).run(addr).await;
        Ok(())
    }
}
