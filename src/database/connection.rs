use std::future::Future;

use log::{error, warn};
use openssl::ssl::{SslConnector, SslMethod};
use postgres_openssl::MakeTlsConnector;
use tokio::time::Duration;
use tokio_postgres::{Client, NoTls};
use url::Url;

const MAX_RETRIES: usize = 10;
const WAIT_BETWEEN_RETRIES: u64 = 5;

/// TLS connector trusting the CA certificate at `sslrootcert_path`
pub fn create_ssl_connector(sslrootcert_path: &str) -> Result<MakeTlsConnector, String> {
    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|e| format!("SSL builder error: {}", e))?;

    builder
        .set_ca_file(sslrootcert_path)
        .map_err(|e| format!("Error loading CA cert: {}", e))?;

    Ok(MakeTlsConnector::new(builder.build()))
}

/// Take the `sslrootcert` query parameter out of a connection URL
///
/// tokio-postgres does not understand `sslrootcert`, so it is removed and the
/// remaining parameters are kept in their original order.
///
/// # Returns
/// The certificate path, if any, and the URL to hand to tokio-postgres
pub fn split_sslrootcert(url: &Url) -> (Option<String>, String) {
    let mut sslrootcert_path = None;
    let mut clean_params = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == "sslrootcert" {
            sslrootcert_path = Some(value.to_string());
        } else {
            clean_params.push((key.into_owned(), value.into_owned()));
        }
    }

    let mut clean_url = url.clone();
    clean_url.set_query(None);
    if !clean_params.is_empty() {
        let query = clean_params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        clean_url.set_query(Some(&query));
    }

    (sslrootcert_path, clean_url.to_string())
}

fn spawn_connection<C>(connection: C)
where
    C: Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("Connection error: {}", e);
        }
    });
}

/// Open one client connection, over TLS when the URL names a root certificate
pub async fn connect(database_url: &str) -> Result<Client, String> {
    let url = Url::parse(database_url).map_err(|e| format!("URL parse error: {}", e))?;
    let (sslrootcert_path, clean_database_url) = split_sslrootcert(&url);

    match sslrootcert_path {
        Some(path) => {
            let connector = create_ssl_connector(&path)?;
            let (client, connection) = tokio_postgres::connect(&clean_database_url, connector)
                .await
                .map_err(|e| format!("Connection error: {}", e))?;
            spawn_connection(connection);
            Ok(client)
        }
        None => {
            let (client, connection) = tokio_postgres::connect(&clean_database_url, NoTls)
                .await
                .map_err(|e| format!("Connection error: {}", e))?;
            spawn_connection(connection);
            Ok(client)
        }
    }
}

/// Connect and run `operation`, retrying both on failure
///
/// # Arguments
/// * `database_url` - PostgreSQL connection string, optionally with `sslrootcert`
/// * `operation` - Statement to run on a fresh client
///
/// # Returns
/// Ok once the operation succeeds, Err after the last failed attempt
pub async fn execute_with_retry<F, Fut>(database_url: &str, operation: F) -> Result<(), String>
where
    F: Fn(Client) -> Fut + Send + Sync,
    Fut: Future<Output = Result<u64, tokio_postgres::Error>> + Send,
{
    for attempt in 0..MAX_RETRIES {
        match connect(database_url).await {
            Ok(client) => match operation(client).await {
                Ok(_) => return Ok(()),
                Err(e) => error!("Attempt {}: query error: {}", attempt + 1, e),
            },
            Err(e) => error!("Attempt {}: {}", attempt + 1, e),
        }

        if attempt < MAX_RETRIES - 1 {
            warn!("Retrying in {} seconds", WAIT_BETWEEN_RETRIES);
            tokio::time::sleep(Duration::from_secs(WAIT_BETWEEN_RETRIES)).await;
        }
    }

    Err("Max retries exceeded".into())
}
