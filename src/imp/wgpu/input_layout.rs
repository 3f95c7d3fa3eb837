// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::images::device::DeviceError;
use crate::images::input_signature::InputSignature;
use crate::images::vertex_layout::{VertexFormat, VertexLayoutKey};

fn wgpu_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32 => wgpu::VertexFormat::Float32,
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        VertexFormat::Float16x2 => wgpu::VertexFormat::Float16x2,
        VertexFormat::Float16x4 => wgpu::VertexFormat::Float16x4,
        VertexFormat::Uint32 => wgpu::VertexFormat::Uint32,
        VertexFormat::Uint32x2 => wgpu::VertexFormat::Uint32x2,
        VertexFormat::Uint32x3 => wgpu::VertexFormat::Uint32x3,
        VertexFormat::Uint32x4 => wgpu::VertexFormat::Uint32x4,
        VertexFormat::Sint32 => wgpu::VertexFormat::Sint32,
        VertexFormat::Sint32x2 => wgpu::VertexFormat::Sint32x2,
        VertexFormat::Sint32x3 => wgpu::VertexFormat::Sint32x3,
        VertexFormat::Sint32x4 => wgpu::VertexFormat::Sint32x4,
        VertexFormat::Uint16x2 => wgpu::VertexFormat::Uint16x2,
        VertexFormat::Uint16x4 => wgpu::VertexFormat::Uint16x4,
        VertexFormat::Unorm16x2 => wgpu::VertexFormat::Unorm16x2,
        VertexFormat::Unorm16x4 => wgpu::VertexFormat::Unorm16x4,
        VertexFormat::Uint8x4 => wgpu::VertexFormat::Uint8x4,
        VertexFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
        VertexFormat::Snorm8x4 => wgpu::VertexFormat::Snorm8x4,
    }
}

#[derive(Debug, Clone)]
struct VertexBuffer {
    array_stride: u64,
    step_mode: wgpu::VertexStepMode,
    attributes: Vec<wgpu::VertexAttribute>,
}

/// An input layout compiled for wgpu: one vertex buffer layout per slot, from slot 0 up to the
/// highest slot the layout describes.
///
/// Slots the description skips are filled with empty layouts so that buffer indices keep matching
/// slot numbers.
#[derive(Debug, Clone)]
pub struct WgpuInputLayout {
    buffers: Vec<VertexBuffer>,
}

impl WgpuInputLayout {
    pub(super) fn compile(
        limits: &wgpu::Limits,
        signature: &InputSignature,
        layout: &VertexLayoutKey,
    ) -> Result<Self, DeviceError> {
        let description = layout.description();
        if let Some(buffer) = description
            .buffers()
            .iter()
            .find(|b| b.slot() >= limits.max_vertex_buffers)
        {
            return Err(DeviceError::InputLayout(format!(
                "slot {} exceeds the device limit of {} vertex buffers",
                buffer.slot(),
                limits.max_vertex_buffers
            )));
        }
        //every slot is below the limit, so this cannot overflow
        let slot_count = description
            .buffers()
            .iter()
            .map(|b| b.slot() + 1)
            .max()
            .unwrap_or(0);
        let mut buffers: Vec<VertexBuffer> = (0..slot_count)
            .map(|_| VertexBuffer {
                array_stride: 0,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: Vec::new(),
            })
            .collect();
        for buffer in description.buffers() {
            let target = &mut buffers[buffer.slot() as usize];
            target.array_stride = layout.stride(buffer.slot()).unwrap_or(0) as u64;
            if buffer.is_per_instance() {
                if buffer.step_rate() != 1 {
                    return Err(DeviceError::InputLayout(format!(
                        "slot {} steps every {} instances; wgpu only steps every instance",
                        buffer.slot(),
                        buffer.step_rate()
                    )));
                }
                target.step_mode = wgpu::VertexStepMode::Instance;
            }
        }

        let matched = signature.match_layout(layout)?;
        for (parameter, element) in matched {
            let format = wgpu_format(element.format());
            let alignment = format.size().min(4) as u32;
            if element.offset() % alignment != 0 {
                return Err(DeviceError::InputLayout(format!(
                    "{}{} at offset {} is not {alignment}-byte aligned",
                    element.semantic_name(),
                    element.semantic_index(),
                    element.offset()
                )));
            }
            buffers[element.slot() as usize]
                .attributes
                .push(wgpu::VertexAttribute {
                    format,
                    offset: element.offset() as u64,
                    shader_location: parameter.location(),
                });
        }
        Ok(WgpuInputLayout { buffers })
    }

    /// Layouts for `wgpu::VertexState::buffers`, indexed by slot.
    pub fn vertex_buffers(&self) -> Vec<wgpu::VertexBufferLayout<'_>> {
        self.buffers
            .iter()
            .map(|b| wgpu::VertexBufferLayout {
                array_stride: b.array_stride,
                step_mode: b.step_mode,
                attributes: &b.attributes,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::input_signature::SignatureParameter;
    use crate::images::vertex_layout::{VertexBufferLayout, VertexElement, VertexLayoutDescription};

    fn signature() -> InputSignature {
        InputSignature::new(
            b"wgpu_vs".to_vec(),
            vec![
                SignatureParameter::new("POSITION", 0, 0, 3),
                SignatureParameter::new("TEXCOORD", 1, 5, 4),
            ],
        )
    }

    #[test]
    fn gaps_between_slots_are_filled() {
        let key = VertexLayoutKey::canonicalize(
            &VertexLayoutDescription::new()
                .with_buffer(VertexBufferLayout::new(0).append("POSITION", 0, VertexFormat::Float32x3))
                .with_buffer(
                    VertexBufferLayout::new(2)
                        .per_instance(1)
                        .append("TEXCOORD", 1, VertexFormat::Float32x4),
                ),
        );
        let compiled = WgpuInputLayout::compile(&wgpu::Limits::default(), &signature(), &key).unwrap();
        let buffers = compiled.vertex_buffers();
        assert_eq!(buffers.len(), 3);
        assert_eq!(buffers[0].array_stride, 12);
        assert_eq!(buffers[0].attributes[0].shader_location, 0);
        assert!(buffers[1].attributes.is_empty());
        assert_eq!(buffers[2].step_mode, wgpu::VertexStepMode::Instance);
        assert_eq!(buffers[2].attributes[0].shader_location, 5);
        assert_eq!(buffers[2].attributes[0].format, wgpu::VertexFormat::Float32x4);
    }

    #[test]
    fn rejects_what_wgpu_cannot_express() {
        let stepped = VertexLayoutKey::canonicalize(
            &VertexLayoutDescription::new()
                .with_buffer(VertexBufferLayout::new(0).append("POSITION", 0, VertexFormat::Float32x3))
                .with_buffer(
                    VertexBufferLayout::new(1)
                        .per_instance(2)
                        .append("TEXCOORD", 1, VertexFormat::Float32x4),
                ),
        );
        assert!(WgpuInputLayout::compile(&wgpu::Limits::default(), &signature(), &stepped).is_err());

        let misaligned = VertexLayoutKey::canonicalize(&VertexLayoutDescription::single(
            VertexBufferLayout::new(0)
                .element(VertexElement::new("POSITION", 0, VertexFormat::Float32x3).at_offset(2))
                .append("TEXCOORD", 1, VertexFormat::Float32x4),
        ));
        assert!(WgpuInputLayout::compile(&wgpu::Limits::default(), &signature(), &misaligned).is_err());
    }

    #[test]
    fn slots_past_the_device_limit_are_rejected() {
        let limits = wgpu::Limits::default();
        for slot in [limits.max_vertex_buffers, u32::MAX] {
            let key = VertexLayoutKey::canonicalize(&VertexLayoutDescription::single(
                VertexBufferLayout::new(slot).append("POSITION", 0, VertexFormat::Float32x3),
            ));
            assert!(matches!(
                WgpuInputLayout::compile(&limits, &signature(), &key),
                Err(DeviceError::InputLayout(_))
            ));
        }
    }
}
