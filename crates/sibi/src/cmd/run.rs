use sibi::facade::{Facade, FacadeConfig};
use sibi_gateway::{Gateway, GatewayConfig, TwsCodec};
use sibi_transport::TcpConnector;
use tracing::{info, warn};

use crate::cmd::RunArgs;
use crate::exit::{io_error, CliResult, SUCCESS};

pub fn run(args: RunArgs) -> CliResult<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;
    runtime.block_on(serve(args))
}

async fn serve(args: RunArgs) -> CliResult<i32> {
    let config = GatewayConfig::default()
        .with_client_id(args.client_id)
        .with_idle_timeout(args.idle_timeout)
        .with_request_timeout(args.request_timeout);
    let connector = TcpConnector::new(&args.upstream.tws_host, args.upstream.tws_port)
        .with_connect_timeout(args.upstream.connect_timeout);

    info!(
        host = %args.upstream.tws_host,
        port = args.upstream.tws_port,
        client_id = args.client_id,
        "starting gateway connection"
    );
    let gateway = Gateway::start(config, connector, TwsCodec::new());

    let facade_config = FacadeConfig::default()
        .with_listen_addr(format!("{}:{}", args.listen_host, args.listen_port))
        .with_max_connections(args.max_connections);
    let facade = match Facade::bind(facade_config, gateway.client()).await {
        Ok(facade) => facade,
        Err(err) => {
            gateway.stop().await;
            return Err(io_error("facade bind failed", err));
        }
    };
    if let Ok(addr) = facade.local_addr() {
        info!(%addr, max_connections = args.max_connections, "facade listening");
    }

    let served = facade.serve(shutdown_signal()).await;
    gateway.stop().await;
    served.map_err(|err| io_error("facade failed", err))?;

    info!("stopped");
    Ok(SUCCESS)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("interrupt received, shutting down"),
        Err(err) => warn!(error = %err, "signal handler setup failed, shutting down"),
    }
}
