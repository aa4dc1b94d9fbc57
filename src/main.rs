use clap::Parser;
use mesa_auth::cli::{
    Args, build_config, handle_grant_admin, init_logging, load_jwt_secret, open_database,
};
use mesa_auth::run_server;
use tracing::{error, info};

fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    if let Some(email) = args.grant_admin.clone() {
        let granted = runtime().block_on(grant_admin(&args, &email));
        std::process::exit(if granted { 0 } else { 1 });
    }

    // Read before the runtime starts its worker threads
    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    runtime().block_on(serve(args, jwt_secret));
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to start runtime");
            std::process::exit(1);
        })
}

async fn grant_admin(args: &Args, email: &str) -> bool {
    let Some(db) = open_database(&args.database, args.db_connect_attempts).await else {
        return false;
    };
    handle_grant_admin(&db, email).await
}

async fn serve(args: Args, jwt_secret: String) {
    let Some(db) = open_database(&args.database, args.db_connect_attempts).await else {
        std::process::exit(1);
    };

    let config = build_config(&args, db, jwt_secret);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(e) => error!(error = %e, "Failed to read local address"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
