use std::io::Read;

use scene::node::SceneNode;
use serde::{Deserialize, Serialize};

use crate::model_codec::{
    DecodeError, MAX_QUANTIZATION_BITS, ModelHeader, VERSION_LATEST, read_body, read_header,
};

pub const CODEC_NAME: &str = "qmsh";
pub const DECODER_MODULE_FILE_NAME: &str = "decoder.json";

/// Runtime artifact describing what a decoder build can handle. It is served
/// next to the models and must be loaded before the first decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecoderModule {
    pub codec: String,
    pub versions: Vec<u16>,
    pub max_quantization_bits: u8,
}

impl DecoderModule {
    /// The module matching this build of the codec.
    pub fn current() -> Self {
        Self {
            codec: CODEC_NAME.to_string(),
            versions: vec![VERSION_LATEST],
            max_quantization_bits: MAX_QUANTIZATION_BITS,
        }
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(bytes).map_err(|e| DecodeError::IncompatibleDecoderModule {
            reason: format!("manifest parse error: {e}"),
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Streaming model decoder. Unusable until a [`DecoderModule`] is configured.
#[derive(Debug, Clone, Default)]
pub struct ModelDecoder {
    module: Option<DecoderModule>,
}

impl ModelDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_configured(&self) -> bool {
        self.module.is_some()
    }

    pub fn module(&self) -> Option<&DecoderModule> {
        self.module.as_ref()
    }

    pub fn configure(&mut self, module: DecoderModule) -> Result<(), DecodeError> {
        if module.codec != CODEC_NAME {
            return Err(DecodeError::IncompatibleDecoderModule {
                reason: format!("codec {:?}, expected {CODEC_NAME:?}", module.codec),
            });
        }
        if !module.versions.contains(&VERSION_LATEST) {
            return Err(DecodeError::IncompatibleDecoderModule {
                reason: format!(
                    "module supports versions {:?}, codec writes {VERSION_LATEST}",
                    module.versions
                ),
            });
        }
        tracing::debug!(versions = ?module.versions, "decoder module configured");
        self.module = Some(module);
        Ok(())
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<SceneNode, DecodeError> {
        let mut cursor = std::io::Cursor::new(bytes);
        self.decode_from_reader(&mut cursor)
    }

    pub fn decode_from_reader<R: Read>(&self, r: &mut R) -> Result<SceneNode, DecodeError> {
        let module = self.module.as_ref().ok_or(DecodeError::DecoderNotConfigured)?;
        let header = read_header(r)?;
        check_header(module, &header)?;
        read_body(r, &header)
    }
}

fn check_header(module: &DecoderModule, header: &ModelHeader) -> Result<(), DecodeError> {
    if !module.versions.contains(&header.version) {
        return Err(DecodeError::UnsupportedVersion {
            found: header.version,
        });
    }
    if header.quantization_bits > module.max_quantization_bits {
        return Err(DecodeError::InvalidQuantizationBits {
            found: header.quantization_bits,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DecoderModule, ModelDecoder};
    use crate::model_codec::tests::sample_scene;
    use crate::model_codec::{DecodeError, EncodeOptions, encode_model};
    use pretty_assertions::assert_eq;

    #[test]
    fn unconfigured_decoder_refuses_to_decode() {
        let bytes = encode_model(&sample_scene(), EncodeOptions::default()).expect("encode");
        let err = ModelDecoder::new().decode(&bytes).expect_err("not configured");
        assert!(matches!(err, DecodeError::DecoderNotConfigured));
    }

    #[test]
    fn configured_decoder_matches_plain_decode() {
        let bytes = encode_model(&sample_scene(), EncodeOptions::default()).expect("encode");
        let mut decoder = ModelDecoder::new();
        decoder.configure(DecoderModule::current()).expect("configure");
        let via_decoder = decoder.decode(&bytes).expect("decode");
        let (_, plain) = crate::model_codec::decode_model(&bytes).expect("decode");
        assert_eq!(via_decoder, plain);
    }

    #[test]
    fn module_caps_quantization_bits() {
        let bytes = encode_model(
            &sample_scene(),
            EncodeOptions {
                quantization_bits: 16,
            },
        )
        .expect("encode");
        let mut module = DecoderModule::current();
        module.max_quantization_bits = 12;
        let mut decoder = ModelDecoder::new();
        decoder.configure(module).expect("configure");
        let err = decoder.decode(&bytes).expect_err("too many bits");
        assert!(matches!(
            err,
            DecodeError::InvalidQuantizationBits { found: 16 }
        ));
    }

    #[test]
    fn configure_rejects_foreign_codec() {
        let mut module = DecoderModule::current();
        module.codec = "draco".to_string();
        let err = ModelDecoder::new().configure(module).expect_err("codec");
        assert!(matches!(err, DecodeError::IncompatibleDecoderModule { .. }));
    }

    #[test]
    fn configure_rejects_module_without_current_version() {
        let mut module = DecoderModule::current();
        module.versions = vec![0];
        let mut decoder = ModelDecoder::new();
        assert!(decoder.configure(module).is_err());
        assert!(!decoder.is_configured());
    }

    #[test]
    fn module_json_round_trips() {
        let module = DecoderModule::current();
        let json = module.to_json_pretty().expect("serialize");
        let parsed = DecoderModule::from_json_slice(json.as_bytes()).expect("parse");
        assert_eq!(parsed, module);
    }

    #[test]
    fn garbage_manifest_is_incompatible() {
        let err = DecoderModule::from_json_slice(b"<html>").expect_err("parse");
        assert!(matches!(err, DecodeError::IncompatibleDecoderModule { .. }));
    }
}
