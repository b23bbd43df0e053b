use log::info;

/// Keeps the puffin http server alive while held.
pub struct ProfilerServer {
    _server: puffin_http::Server,
}

/// Turn on profiling scopes and serve them over http on the default puffin port.
pub fn initialize() -> Result<ProfilerServer, anyhow::Error> {
    let server_addr = format!("127.0.0.1:{}", puffin_http::DEFAULT_PORT);
    let server = puffin_http::Server::new(&server_addr)?;
    profiling::puffin::set_scopes_on(true);

    info!("Puffin profiler listening on {server_addr}");

    Ok(ProfilerServer { _server: server })
}
