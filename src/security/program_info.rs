//! The SpcSpOpusInfo authenticated attribute: publisher-facing program
//! name and more-info URL.

use der::Decode;

use crate::error::{AuthenticodeFormatError, PeErrorCode};

use super::asn1::{SpcLink, SpcSpOpusInfo};
use super::oids;
use super::pkcs7::AttributeMap;

/// Program metadata recorded by the signer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInfo {
    /// The publisher-facing program name.
    pub program_name: Option<String>,
    /// A URL with more information about the program.
    pub more_info_url: Option<String>,
}

/// Reads the opus-info attribute, when present.
pub fn get_program_info(
    authenticated: &AttributeMap<'_>,
) -> Result<Option<ProgramInfo>, PeErrorCode> {
    let Some(value) = authenticated.get_attribute(&oids::SPC_SP_OPUS_INFO)? else {
        return Ok(None);
    };
    let info = SpcSpOpusInfo::from_der(value.full)
        .map_err(|_| PeErrorCode::from(AuthenticodeFormatError::InvalidProgramInfo))?;

    Ok(Some(ProgramInfo {
        program_name: info.program_name.map(|name| name.to_string_lossy()),
        more_info_url: match info.more_info {
            Some(SpcLink::Url(url)) => Some(String::from_utf8_lossy(url).into_owned()),
            _ => None,
        },
    }))
}
