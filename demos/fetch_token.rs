//! Fetch a token from a client credentials endpoint and cache it on disk.
//!
//! # Usage
//!
//! ```bash
//! export CREDENTIAL_CACHE_CLIENT_ID="your-client-id"
//! export CREDENTIAL_CACHE_CLIENT_SECRET="your-client-secret"
//! export CREDENTIAL_CACHE_TOKEN_ENDPOINT="https://api.petfinder.com/v2/oauth2/token"
//! cargo run --example fetch_token
//! ```
//!
//! Running it twice within the token lifetime serves the second run from the
//! cache file without contacting the endpoint.

use credential_cache::CredentialProviderBuilder;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    let cache_dir = std::env::temp_dir().join("credential-cache-demo");
    let provider = Arc::new(
        CredentialProviderBuilder::from_env()
            .file_store(&cache_dir)
            .build()?,
    );
    println!("Cache directory: {}", cache_dir.display());

    let mut handles = Vec::new();
    for i in 0..5 {
        let provider = provider.clone();
        handles.push(tokio::spawn(async move {
            (i, provider.valid_credential().await)
        }));
    }

    for handle in handles {
        match handle.await? {
            (i, Some(credential)) => {
                println!("caller {}: token valid until {}", i, credential.expires_at)
            }
            (i, None) => println!("caller {}: unauthenticated", i),
        }
    }

    println!("{:#?}", provider.stats());
    Ok(())
}
