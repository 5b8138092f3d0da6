use crate::adapters::audit::AuditLog;
use crate::adapters::directory::SoapDirectory;
use crate::adapters::soap;
use crate::config::MarketConfig;
use crate::core::peer::{PeerClient, PeerListener};
use crate::core::service::ShareMarketService;
use crate::domain::ports::ShareMarket;
use crate::utils::error::{MarketError, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};

/// A running market: the SOAP endpoint and the UDP peer listener over one ledger.
pub struct MarketNode {
    service: Arc<ShareMarketService>,
    http: TcpListener,
    udp: PeerListener,
    endpoint: String,
    path: String,
}

impl MarketNode {
    /// Binds the addresses configured for `market`.
    pub async fn bind(config: &MarketConfig, market: &str) -> Result<Self> {
        let entry = config
            .market(market)
            .ok_or_else(|| MarketError::InvalidConfigValueError {
                field: "market".to_string(),
                value: market.to_string(),
                reason: "Not a configured market".to_string(),
            })?;

        let http = TcpListener::bind(entry.bind_address()?).await?;
        let udp = UdpSocket::bind(entry.udp_socket_addr()?).await?;
        Self::from_sockets(config, market, http, udp)
    }

    /// Builds a node over already-bound sockets.
    pub fn from_sockets(
        config: &MarketConfig,
        market: &str,
        http: TcpListener,
        udp: UdpSocket,
    ) -> Result<Self> {
        let entry = config
            .market(market)
            .ok_or_else(|| MarketError::MissingConfigError {
                field: format!("markets.{}", market),
            })?;

        let directory = Arc::new(SoapDirectory::from_config(config)?);
        let audit = AuditLog::server(&config.server.log_dir, &entry.name);
        let service = Arc::new(ShareMarketService::new(
            entry.info(),
            directory,
            config.peers()?,
            PeerClient::new(config.peer_timeout()),
            audit,
        ));
        let udp = PeerListener::from_socket(udp, service.ledger());

        Ok(Self {
            service,
            http,
            udp,
            endpoint: entry.endpoint.clone(),
            path: entry.service_path()?,
        })
    }

    pub fn service(&self) -> Arc<ShareMarketService> {
        Arc::clone(&self.service)
    }

    pub fn http_addr(&self) -> Result<SocketAddr> {
        Ok(self.http.local_addr()?)
    }

    pub fn udp_addr(&self) -> Result<SocketAddr> {
        self.udp.local_addr()
    }

    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serves until `shutdown` resolves or either listener fails.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let MarketNode {
            service,
            http,
            udp,
            endpoint,
            path,
        } = self;

        let market = service.market().name.clone();
        let port: Arc<dyn ShareMarket> = service;
        let app = soap::router(&path, port, endpoint.clone());

        tracing::info!("{} Server ready at {}", market, endpoint);

        let http_server = async move {
            axum::serve(http, app)
                .with_graceful_shutdown(shutdown)
                .await
        };

        tokio::select! {
            result = http_server => result?,
            result = udp.serve() => result?,
        }

        tracing::info!("{} Server stopped", market);
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
