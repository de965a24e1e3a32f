//! In-place value filters applied after meshopt attribute decoding.

use byteorder::{ByteOrder, LittleEndian};

use crate::buffer::MeshoptFilter;
use crate::error::{GltfError, Result};

pub fn apply_filter(filter: MeshoptFilter, data: &mut [u8], count: usize, stride: usize) -> Result<()> {
    match filter {
        MeshoptFilter::None => Ok(()),
        MeshoptFilter::Octahedral => match stride {
            4 => {
                decode_octahedral(data, count, 1);
                Ok(())
            }
            8 => {
                decode_octahedral(data, count, 2);
                Ok(())
            }
            _ => Err(GltfError::invalid("OCTAHEDRAL filter needs a stride of 4 or 8")),
        },
        MeshoptFilter::Quaternion => {
            if stride != 8 {
                return Err(GltfError::invalid("QUATERNION filter needs a stride of 8"));
            }
            decode_quaternion(data, count);
            Ok(())
        }
        MeshoptFilter::Exponential => {
            if stride % 4 != 0 {
                return Err(GltfError::invalid("EXPONENTIAL filter needs a stride multiple of 4"));
            }
            decode_exponential(data, count * stride / 4);
            Ok(())
        }
    }
}

fn get(e: &[u8], k: usize, bytes: usize) -> i32 {
    if bytes == 1 {
        e[k] as i8 as i32
    } else {
        LittleEndian::read_i16(&e[k * 2..k * 2 + 2]) as i32
    }
}

fn set(e: &mut [u8], k: usize, bytes: usize, v: i32) {
    if bytes == 1 {
        e[k] = v as i8 as u8;
    } else {
        LittleEndian::write_i16(&mut e[k * 2..k * 2 + 2], v as i16);
    }
}

/// Round half away from zero, then truncate.
fn round_to_int(v: f32) -> i32 {
    (v + if v >= 0.0 { 0.5 } else { -0.5 }) as i32
}

fn decode_octahedral(data: &mut [u8], count: usize, bytes: usize) {
    let max = ((1i32 << (bytes * 8 - 1)) - 1) as f32;
    let size = 4 * bytes;

    for e in data.chunks_exact_mut(size).take(count) {
        // z is reconstructed from the encoded "one" in the third component
        let mut x = get(e, 0, bytes) as f32;
        let mut y = get(e, 1, bytes) as f32;
        let z = get(e, 2, bytes) as f32 - x.abs() - y.abs();

        // fold the lower hemisphere
        let t = if z >= 0.0 { 0.0 } else { z };
        x += if x >= 0.0 { t } else { -t };
        y += if y >= 0.0 { t } else { -t };

        let l = (x * x + y * y + z * z).sqrt();
        let s = max / l;

        set(e, 0, bytes, round_to_int(x * s));
        set(e, 1, bytes, round_to_int(y * s));
        set(e, 2, bytes, round_to_int(z * s));
    }
}

fn decode_quaternion(data: &mut [u8], count: usize) {
    let scale = 1.0 / 2f32.sqrt();

    for e in data.chunks_exact_mut(8).take(count) {
        let w_bits = get(e, 3, 2);
        // the scale lives in the high bits of the fourth component
        let sf = w_bits | 3;
        let ss = scale / sf as f32;

        let x = get(e, 0, 2) as f32 * ss;
        let y = get(e, 1, 2) as f32 * ss;
        let z = get(e, 2, 2) as f32 * ss;

        let ww = 1.0 - x * x - y * y - z * z;
        let w = ww.max(0.0).sqrt();

        let xf = round_to_int(x * 32767.0);
        let yf = round_to_int(y * 32767.0);
        let zf = round_to_int(z * 32767.0);
        let wf = round_to_int(w * 32767.0);

        // the index of the dropped (largest) component decides output order
        let qc = (w_bits & 3) as usize;
        set(e, (qc + 1) & 3, 2, xf);
        set(e, (qc + 2) & 3, 2, yf);
        set(e, (qc + 3) & 3, 2, zf);
        set(e, qc, 2, wf);
    }
}

fn decode_exponential(data: &mut [u8], count: usize) {
    for e in data.chunks_exact_mut(4).take(count) {
        let v = LittleEndian::read_u32(e);
        let m = ((v << 8) as i32) >> 8;
        let exp = (v as i32) >> 24;
        // 2^exp built directly from the exponent bits
        let power = f32::from_bits(((exp + 127) as u32) << 23);
        LittleEndian::write_f32(e, power * m as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential() {
        let mut data = Vec::new();
        data.extend_from_slice(&0x0100_0003u32.to_le_bytes()); // 3 * 2^1
        data.extend_from_slice(&0xff00_0001u32.to_le_bytes()); // 1 * 2^-1
        data.extend_from_slice(&0x00ff_fffeu32.to_le_bytes()); // -2 * 2^0
        apply_filter(MeshoptFilter::Exponential, &mut data, 3, 4).unwrap();
        let values: Vec<f32> = data.chunks(4).map(LittleEndian::read_f32).collect();
        assert_eq!(values, vec![6.0, 0.5, -2.0]);
    }

    #[test]
    fn test_octahedral_axis_aligned() {
        let mut data = vec![127u8, 0, 127, 9];
        apply_filter(MeshoptFilter::Octahedral, &mut data, 1, 4).unwrap();
        assert_eq!(data, vec![127, 0, 0, 9]);

        let mut data = vec![0u8, 0, 127, 0];
        apply_filter(MeshoptFilter::Octahedral, &mut data, 1, 4).unwrap();
        assert_eq!(data, vec![0, 0, 127, 0]);
    }

    #[test]
    fn test_octahedral_lower_hemisphere() {
        let mut data = vec![100u8, 100, 127, 0];
        apply_filter(MeshoptFilter::Octahedral, &mut data, 1, 4).unwrap();
        let (x, y, z) = (data[0] as i8, data[1] as i8, data[2] as i8);
        assert_eq!(x, y);
        assert!(x > 0);
        assert!(z < 0);
    }

    #[test]
    fn test_quaternion_identity() {
        let mut data = Vec::new();
        for v in [0i16, 0, 0, 0x7fff] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        apply_filter(MeshoptFilter::Quaternion, &mut data, 1, 8).unwrap();
        let values: Vec<i16> = data.chunks(2).map(LittleEndian::read_i16).collect();
        assert_eq!(values, vec![0, 0, 0, 32767]);
    }

    #[test]
    fn test_filter_stride_checks() {
        let mut data = vec![0u8; 12];
        assert!(apply_filter(MeshoptFilter::Octahedral, &mut data, 1, 12).is_err());
        assert!(apply_filter(MeshoptFilter::Quaternion, &mut data, 1, 4).is_err());
        assert!(apply_filter(MeshoptFilter::None, &mut data, 1, 12).is_ok());
    }
}
