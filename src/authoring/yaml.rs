use super::dto::FlowGraphDto;
use anyhow::Result;

/// Parse a YAML string into a FlowGraphDto.
///
/// Validation is NOT performed here — call `validate_dto()`, or use
/// `build_flow()` which validates before constructing the registries.
pub fn parse_flow_yaml(yaml_str: &str) -> Result<FlowGraphDto> {
    let dto: FlowGraphDto = serde_yaml::from_str(yaml_str)?;
    Ok(dto)
}
