//! Best-effort source verification on a block explorer

use std::{fs, time::Duration};

use alloy::{
    primitives::{hex, Address},
    providers::Provider,
    transports::http::reqwest::{Client, Url},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    constants::{
        PROXY_IMPLEMENTATION_STORAGE_SLOT, STANDARD_JSON_CODE_FORMAT, VERIFICATION_SETTLE_SECS,
    },
    errors::ScriptError,
    types::ContractArtifact,
    utils::read_address_slot,
};

/// A service able to verify a deployed contract's source
pub trait Verifier {
    /// Verify that the contract at `address` was built from `artifact` and
    /// deployed with the given ABI-encoded constructor arguments
    async fn verify(
        &self,
        address: Address,
        artifact: &ContractArtifact,
        constructor_args: &[u8],
    ) -> Result<(), ScriptError>;
}

/// Drives a single verification attempt, tolerating the explorer's benign
/// rejections
#[derive(Clone, Debug)]
pub struct VerificationRetrier<V> {
    /// The verification service
    verifier: V,
    /// How long to wait for the deployment to be indexed
    settle: Duration,
}

impl<V: Verifier> VerificationRetrier<V> {
    /// A retrier with the default settle window
    pub fn new(verifier: V) -> Self {
        Self {
            verifier,
            settle: Duration::from_secs(VERIFICATION_SETTLE_SECS),
        }
    }

    /// Override the settle window
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// The wrapped verification service
    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// Verify the contract at `address`.
    ///
    /// Returns `Ok` when the explorer accepted the source or rejected it with
    /// a benign status. Any other failure is returned as
    /// [`ScriptError::VerificationFatal`] for the caller to report.
    pub async fn verify(
        &self,
        address: Address,
        network: &str,
        artifact: &ContractArtifact,
        wait_for_settle: bool,
    ) -> Result<(), ScriptError> {
        let contract_name = &artifact.contract_name;
        if wait_for_settle {
            info!("Waiting for block to be sealed...");
            tokio::time::sleep(self.settle).await;
        }

        match self
            .verifier
            .verify(address, artifact, &[] /* constructor_args */)
            .await
        {
            Ok(()) => {
                info!("{contract_name} verified on {network}");
                Ok(())
            }
            Err(e) => match classify(e) {
                ScriptError::VerificationRecoverable(msg) => {
                    debug!("ignoring explorer response for {contract_name}: {msg}");
                    Ok(())
                }
                err => {
                    error!("verifying {contract_name} on {network}: {err}");
                    Err(err)
                }
            },
        }
    }
}

/// Re-classify a verifier failure by its message
fn classify(err: ScriptError) -> ScriptError {
    match err {
        ScriptError::VerificationRecoverable(msg) | ScriptError::VerificationFatal(msg) => {
            ScriptError::from_verification_message(msg)
        }
        other => ScriptError::from_verification_message(other.to_string()),
    }
}

// ---------------------
// | Etherscan backend |
// ---------------------

/// A response from an Etherscan-compatible API
#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    /// "1" on success, "0" on failure
    status: String,
    /// A short status message
    message: String,
    /// The submission GUID on success, the reason on failure
    result: Value,
}

impl EtherscanResponse {
    /// The result as a string
    fn result_str(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A compiler build info, as written by Hardhat to `artifacts/build-info`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildInfo {
    /// The full compiler version, e.g. `0.8.17+commit.8df45f5f`
    solc_long_version: String,
    /// The standard JSON input given to the compiler
    input: Value,
}

/// Verifies contracts through an Etherscan-compatible explorer API.
///
/// When the target is an EIP-1967 proxy the implementation's source is
/// verified and the explorer is then asked to link the proxy to it.
pub struct EtherscanVerifier<P> {
    /// The HTTP client
    client: Client,
    /// The explorer API endpoint
    api_url: Url,
    /// The explorer API key
    api_key: String,
    /// Provider used to resolve proxy implementations
    provider: P,
}

impl<P: Provider> EtherscanVerifier<P> {
    /// Create a verifier submitting to the explorer API at `api_url`
    pub fn new(api_url: Url, api_key: String, provider: P) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
            provider,
        }
    }

    /// Submit the artifact's source for the contract at `address`
    async fn verify_source(
        &self,
        address: Address,
        artifact: &ContractArtifact,
        constructor_args: &[u8],
    ) -> Result<(), ScriptError> {
        let build_info_path = artifact.build_info.as_ref().ok_or_else(|| {
            ScriptError::VerificationFatal(format!(
                "no build info for {}",
                artifact.qualified_name
            ))
        })?;
        let build_info: BuildInfo = fs::read(build_info_path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()))
            .map_err(|e| {
                ScriptError::VerificationFatal(format!(
                    "reading build info {}: {e}",
                    build_info_path.display()
                ))
            })?;

        let form = vec![
            ("apikey", self.api_key.clone()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", address.to_checksum(None)),
            ("sourceCode", build_info.input.to_string()),
            ("codeformat", STANDARD_JSON_CODE_FORMAT.to_string()),
            ("contractname", artifact.qualified_name.clone()),
            ("compilerversion", format!("v{}", build_info.solc_long_version)),
            // The misspelling is part of the Etherscan API
            ("constructorArguements", hex::encode(constructor_args)),
        ];

        let guid = self.submit(&form).await?;
        info!("source for {address:#x} submitted for verification, guid {guid}");
        Ok(())
    }

    /// Ask the explorer to link a proxy to its verified implementation
    async fn verify_proxy(&self, proxy: Address, implementation: Address) -> Result<(), ScriptError> {
        let form = vec![
            ("apikey", self.api_key.clone()),
            ("module", "contract".to_string()),
            ("action", "verifyproxycontract".to_string()),
            ("address", proxy.to_checksum(None)),
            ("expectedimplementation", implementation.to_checksum(None)),
        ];

        let guid = self.submit(&form).await?;
        info!("proxy {proxy:#x} linked to {implementation:#x}, guid {guid}");
        Ok(())
    }

    /// Post a form to the explorer API, returning the `result` on success
    async fn submit(&self, form: &[(&str, String)]) -> Result<String, ScriptError> {
        let resp = self
            .client
            .post(self.api_url.clone())
            .form(form)
            .send()
            .await
            .map_err(|e| ScriptError::VerificationFatal(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ScriptError::VerificationFatal(e.to_string()))?;
        parse_response(status.as_u16(), &body)
    }
}

/// Interpret an explorer API response, returning the `result` on success.
///
/// Failures are classified by their message, so an HTTP 400 or an "already
/// verified" answer comes back recoverable.
fn parse_response(status: u16, body: &str) -> Result<String, ScriptError> {
    if !(200..300).contains(&status) {
        return Err(ScriptError::from_verification_message(format!(
            "Etherscan API call failed with status {status}, response: {body}"
        )));
    }

    let parsed: EtherscanResponse = serde_json::from_str(body).map_err(|e| {
        ScriptError::VerificationFatal(format!("unexpected explorer response {body}: {e}"))
    })?;
    if parsed.status != "1" {
        return Err(ScriptError::from_verification_message(format!(
            "{}: {}",
            parsed.message,
            parsed.result_str()
        )));
    }

    Ok(parsed.result_str())
}

impl<P: Provider> Verifier for EtherscanVerifier<P> {
    async fn verify(
        &self,
        address: Address,
        artifact: &ContractArtifact,
        constructor_args: &[u8],
    ) -> Result<(), ScriptError> {
        let implementation =
            read_address_slot(&self.provider, address, PROXY_IMPLEMENTATION_STORAGE_SLOT)
                .await
                .map_err(|e| ScriptError::VerificationFatal(e.to_string()))?;

        if implementation.is_zero() {
            return self.verify_source(address, artifact, constructor_args).await;
        }

        // The implementation may have been verified by an earlier deployment
        if let Err(e) = self
            .verify_source(implementation, artifact, constructor_args)
            .await
        {
            if !e.is_recoverable_verification() {
                return Err(e);
            }
            warn!("implementation {implementation:#x}: {e}");
        }
        self.verify_proxy(address, implementation).await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use alloy::primitives::{address, Address, Bytes};

    use super::{parse_response, VerificationRetrier, Verifier};
    use crate::{errors::ScriptError, types::ContractArtifact};

    const TARGET: Address = address!("000000000000000000000000000000000000abcd");

    fn artifact() -> ContractArtifact {
        ContractArtifact {
            qualified_name: "contracts/VEO.sol:VEO".to_string(),
            contract_name: "VEO".to_string(),
            source_name: "contracts/VEO.sol".to_string(),
            abi: vec![],
            bytecode: Bytes::new(),
            build_info: None,
        }
    }

    /// A verifier that fails with a fixed message
    struct FailingVerifier {
        message: &'static str,
        calls: AtomicUsize,
    }

    impl FailingVerifier {
        fn new(message: &'static str) -> Self {
            Self {
                message,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Verifier for FailingVerifier {
        async fn verify(
            &self,
            address: Address,
            artifact: &ContractArtifact,
            constructor_args: &[u8],
        ) -> Result<(), ScriptError> {
            assert_eq!(address, TARGET);
            assert_eq!(artifact.contract_name, "VEO");
            assert!(constructor_args.is_empty());
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ScriptError::VerificationFatal(self.message.to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_400_is_swallowed_after_settle() {
        let retrier = VerificationRetrier::new(FailingVerifier::new(
            "Etherscan API call failed with status 400",
        ));

        let start = tokio::time::Instant::now();
        retrier.verify(TARGET, "testnet", &artifact(), true).await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(6));
        assert_eq!(retrier.verifier().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_settle_without_wait() {
        let retrier = VerificationRetrier::new(FailingVerifier::new("Already Verified"));

        let start = tokio::time::Instant::now();
        retrier.verify(TARGET, "mainnet", &artifact(), false).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_other_failures_are_reported() {
        let retrier = VerificationRetrier::new(FailingVerifier::new("connection refused"))
            .with_settle(Duration::ZERO);

        let err = retrier.verify(TARGET, "mainnet", &artifact(), true).await.unwrap_err();
        assert_eq!(
            err,
            ScriptError::VerificationFatal("connection refused".to_string())
        );
    }

    #[test]
    fn test_bad_request_is_recoverable() {
        let err = parse_response(400, "Bad Request").unwrap_err();
        assert!(err.is_recoverable_verification());
    }

    #[test]
    fn test_server_error_is_fatal() {
        let err = parse_response(500, "Internal Server Error").unwrap_err();
        assert!(matches!(err, ScriptError::VerificationFatal(_)));
    }

    #[test]
    fn test_already_verified_is_recoverable() {
        let body = r#"{"status":"0","message":"NOTOK","result":"Contract source code already verified"}"#;
        let err = parse_response(200, body).unwrap_err();
        assert_eq!(
            err,
            ScriptError::VerificationRecoverable(
                "NOTOK: Contract source code already verified".to_string()
            )
        );
    }

    #[test]
    fn test_accepted_submission_returns_guid() {
        let body = r#"{"status":"1","message":"OK","result":"ezq878u486pzijkvvmerl6a9mzwhv6sefgvqi5tkwceejc7tvn"}"#;
        assert_eq!(
            parse_response(200, body).unwrap(),
            "ezq878u486pzijkvvmerl6a9mzwhv6sefgvqi5tkwceejc7tvn"
        );
    }
}
