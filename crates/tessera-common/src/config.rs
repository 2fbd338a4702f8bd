//! Key configuration for signing and verifying tokens.

use std::{
    ffi::OsString,
    fmt::Debug,
    path::{Path, PathBuf},
    sync::Arc,
};

use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::{
    pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, EncodeRsaPublicKey},
    pkcs8::DecodePrivateKey,
    RsaPrivateKey, RsaPublicKey,
};
use serde::Deserialize;
use tracing::info;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "TESSERA_CONFIG";

/// Configuration file used when [CONFIG_PATH_ENV] is not set.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/tessera/tessera.toml";

/// Errors that can happen while loading key configuration.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// A problem with the private signing key.
    #[error("private key error: {0}")]
    PrivateKey(&'static str),

    /// A problem with the verifying certificate.
    #[error("certificate error: {0}")]
    Certificate(&'static str),

    /// A configured file could not be read.
    #[error("could not read {}: {source}", path.display())]
    Io {
        /// The file that was attempted.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid.
    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// No configuration file was found.
    #[error(
        "environment not inferrable: neither ${CONFIG_PATH_ENV} nor {DEFAULT_CONFIG_PATH} exists"
    )]
    EnvironmentNotInferrable,
}

/// Process-wide, read-only key configuration.
///
/// A config without keys is valid: signing and verifying then fail closed.
#[derive(Clone, Default)]
pub struct Config {
    keys: Arc<Keys>,
}

#[derive(Default)]
struct Keys {
    signing: Option<EncodingKey>,
    verifying: Option<DecodingKey>,
}

impl Config {
    /// Construct a new builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load the configuration from a TOML document.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(toml)?;
        let mut builder = Self::builder();

        if let Some(path) = &file.keys.private_key_file {
            builder = builder.with_private_key_pem(&read_file(path)?)?;
        }
        if let Some(path) = &file.keys.certificate_file {
            builder = builder.with_certificate_pem(&read_file(path)?)?;
        }

        Ok(builder.build())
    }

    /// Infer the configuration from the environment the process runs in.
    ///
    /// Reads the file named by `$TESSERA_CONFIG`, falling back to [DEFAULT_CONFIG_PATH].
    pub fn from_environment() -> Result<Self, ConfigError> {
        let path = config_path(
            std::env::var_os(CONFIG_PATH_ENV),
            Path::new(DEFAULT_CONFIG_PATH),
        )?;

        info!(path = %path.display(), "loading tessera configuration");
        let toml = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        Self::from_toml(&toml)
    }

    /// Whether tokens can be signed with this config.
    pub fn can_sign(&self) -> bool {
        self.keys.signing.is_some()
    }

    /// Whether tokens can be verified with this config.
    pub fn can_verify(&self) -> bool {
        self.keys.verifying.is_some()
    }

    pub(crate) fn signing_key(&self) -> Option<&EncodingKey> {
        self.keys.signing.as_ref()
    }

    pub(crate) fn verifying_key(&self) -> Option<&DecodingKey> {
        self.keys.verifying.as_ref()
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("can_sign", &self.can_sign())
            .field("can_verify", &self.can_verify())
            .finish()
    }
}

/// A builder for configuring a [Config].
#[derive(Default)]
pub struct ConfigBuilder {
    signing: Option<(EncodingKey, DecodingKey)>,
    certificate: Option<DecodingKey>,
}

impl ConfigBuilder {
    /// Use the given RSA private key, in PKCS#8 or PKCS#1 PEM format, for signing.
    ///
    /// The verifying key is derived from it.
    pub fn with_private_key_pem(mut self, pem: &[u8]) -> Result<Self, ConfigError> {
        let pem_str =
            std::str::from_utf8(pem).map_err(|_| ConfigError::PrivateKey("not valid UTF-8"))?;

        let private_key = RsaPrivateKey::from_pkcs8_pem(pem_str)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem_str))
            .map_err(|_| ConfigError::PrivateKey("expected an RSA key in PKCS#8 or PKCS#1 PEM"))?;

        let public_der = RsaPublicKey::from(&private_key)
            .to_pkcs1_der()
            .map_err(|_| ConfigError::PrivateKey("could not derive public key"))?;

        // the signer wants PKCS#1, whatever the input format was
        let private_der = private_key
            .to_pkcs1_der()
            .map_err(|_| ConfigError::PrivateKey("could not encode private key"))?;

        self.signing = Some((
            EncodingKey::from_rsa_der(private_der.as_bytes()),
            DecodingKey::from_rsa_der(public_der.as_bytes()),
        ));
        Ok(self)
    }

    /// Verify tokens with the RSA public key of the given X.509 certificate.
    ///
    /// A config built only from a certificate can verify but not sign.
    pub fn with_certificate_pem(mut self, cert: &[u8]) -> Result<Self, ConfigError> {
        let pem = pem::parse(cert).map_err(|_| ConfigError::Certificate("invalid PEM"))?;

        let (_, x509_cert) = x509_parser::parse_x509_certificate(pem.contents())
            .map_err(|_| ConfigError::Certificate("invalid X.509 certificate"))?;

        let public_key = x509_cert.public_key();
        if public_key.algorithm.algorithm != x509_parser::oid_registry::OID_PKCS1_RSAENCRYPTION {
            return Err(ConfigError::Certificate("not an RSA public key"));
        }

        self.certificate = Some(DecodingKey::from_rsa_der(
            &public_key.subject_public_key.data,
        ));
        Ok(self)
    }

    /// Finish the configuration.
    ///
    /// The key derived from a private key takes precedence over a certificate for verification.
    pub fn build(self) -> Config {
        let (signing, verifying) = match self.signing {
            Some((encoding, decoding)) => (Some(encoding), Some(decoding)),
            None => (None, self.certificate),
        };

        Config {
            keys: Arc::new(Keys { signing, verifying }),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    keys: KeysSection,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeysSection {
    #[serde(default, rename = "private-key-file")]
    private_key_file: Option<PathBuf>,

    #[serde(default, rename = "certificate-file")]
    certificate_file: Option<PathBuf>,
}

fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// An explicitly named file always wins, even when it does not exist.
fn config_path(env_path: Option<OsString>, default_path: &Path) -> Result<PathBuf, ConfigError> {
    match env_path {
        Some(path) => Ok(PathBuf::from(path)),
        None if std::fs::exists(default_path).unwrap_or(false) => Ok(default_path.to_path_buf()),
        None => Err(ConfigError::EnvironmentNotInferrable),
    }
}
