use super::{from_params, ApiDto, Param};
use crate::error::{CanvasError, Result};
use serde::{Deserialize, Serialize};

/// Fields of `POST /accounts/:account_id/shared_brand_configs`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateSharedBrandConfigDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// MD5 of the brand config to share
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_config_md5: Option<String>,
}

impl CreateSharedBrandConfigDto {
    pub fn new(name: impl Into<String>, brand_config_md5: impl Into<String>) -> Self {
        CreateSharedBrandConfigDto {
            name: Some(name.into()),
            brand_config_md5: Some(brand_config_md5.into()),
        }
    }

    pub fn from_params(params: Param) -> Result<Self> {
        from_params(params)
    }
}

impl ApiDto for CreateSharedBrandConfigDto {
    fn api_property_name(&self) -> &'static str {
        "shared_brand_config"
    }

    fn validate(&self) -> Result<()> {
        if is_blank(&self.name) {
            return Err(CanvasError::InvalidArgument(
                "shared brand config name is required".to_string(),
            ));
        }
        if is_blank(&self.brand_config_md5) {
            return Err(CanvasError::InvalidArgument(
                "shared brand config brand_config_md5 is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fields of `PUT /accounts/:account_id/shared_brand_configs/:id`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateSharedBrandConfigDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_config_md5: Option<String>,
}

impl UpdateSharedBrandConfigDto {
    pub fn from_params(params: Param) -> Result<Self> {
        from_params(params)
    }
}

impl ApiDto for UpdateSharedBrandConfigDto {
    fn api_property_name(&self) -> &'static str {
        "shared_brand_config"
    }

    fn validate(&self) -> Result<()> {
        if is_blank(&self.name) && is_blank(&self.brand_config_md5) {
            return Err(CanvasError::InvalidArgument(
                "nothing to update: set name or brand_config_md5".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}
