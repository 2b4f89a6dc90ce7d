//! Little-endian primitives, LEB128 varints and zigzag coding shared by the
//! model codec.

use std::io::{Read, Write};

use crate::model_codec::DecodeError;

pub(crate) fn map_io_err(e: std::io::Error) -> DecodeError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        DecodeError::UnexpectedEof
    } else {
        DecodeError::Io {
            source: e.to_string(),
        }
    }
}

pub(crate) fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

pub(crate) fn unzigzag(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

pub(crate) fn read_exact_io<const N: usize>(r: &mut impl Read) -> Result<[u8; N], DecodeError> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf).map_err(map_io_err)?;
    Ok(buf)
}

pub(crate) fn read_exact_io_dyn(r: &mut impl Read, n: usize) -> Result<Vec<u8>, DecodeError> {
    // Grow through `take` so a corrupt length cannot force a huge allocation up front.
    let mut buf = Vec::with_capacity(n.min(1 << 20));
    let read = Read::take(&mut *r, n as u64)
        .read_to_end(&mut buf)
        .map_err(map_io_err)?;
    if read != n {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(buf)
}

pub(crate) fn read_u8_io(r: &mut impl Read) -> Result<u8, DecodeError> {
    Ok(read_exact_io::<1>(r)?[0])
}

pub(crate) fn read_u16_le_io(r: &mut impl Read) -> Result<u16, DecodeError> {
    Ok(u16::from_le_bytes(read_exact_io::<2>(r)?))
}

pub(crate) fn read_i16_le_io(r: &mut impl Read) -> Result<i16, DecodeError> {
    Ok(i16::from_le_bytes(read_exact_io::<2>(r)?))
}

pub(crate) fn read_u32_le_io(r: &mut impl Read) -> Result<u32, DecodeError> {
    Ok(u32::from_le_bytes(read_exact_io::<4>(r)?))
}

pub(crate) fn read_f32_le_io(r: &mut impl Read) -> Result<f32, DecodeError> {
    Ok(f32::from_le_bytes(read_exact_io::<4>(r)?))
}

pub(crate) fn read_f32x3_io(r: &mut impl Read) -> Result<[f32; 3], DecodeError> {
    Ok([read_f32_le_io(r)?, read_f32_le_io(r)?, read_f32_le_io(r)?])
}

pub(crate) fn read_var_u64_io(r: &mut impl Read) -> Result<u64, DecodeError> {
    let mut out: u64 = 0;
    let mut shift = 0;
    for _ in 0..10 {
        let b = read_u8_io(r)?;
        out |= ((b & 0x7F) as u64) << shift;
        if (b & 0x80) == 0 {
            return Ok(out);
        }
        shift += 7;
    }
    Err(DecodeError::InvalidVarint)
}

pub(crate) fn read_var_usize_io(r: &mut impl Read) -> Result<usize, DecodeError> {
    usize::try_from(read_var_u64_io(r)?).map_err(|_| DecodeError::InvalidVarint)
}

pub(crate) fn read_string_io(r: &mut impl Read) -> Result<String, DecodeError> {
    let len = read_var_usize_io(r)?;
    let bytes = read_exact_io_dyn(r, len)?;
    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
}

pub(crate) fn write_u8(w: &mut impl Write, v: u8) -> std::io::Result<()> {
    w.write_all(&[v])
}

pub(crate) fn write_u16_le(w: &mut impl Write, v: u16) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub(crate) fn write_i16_le(w: &mut impl Write, v: i16) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub(crate) fn write_u32_le(w: &mut impl Write, v: u32) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub(crate) fn write_f32_le(w: &mut impl Write, v: f32) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub(crate) fn write_f32x3(w: &mut impl Write, v: [f32; 3]) -> std::io::Result<()> {
    v.iter().try_for_each(|c| write_f32_le(w, *c))
}

pub(crate) fn write_var_u64(w: &mut impl Write, mut v: u64) -> std::io::Result<()> {
    let mut buf: [u8; 10] = [0; 10];
    let mut i = 0;
    while v >= 0x80 {
        buf[i] = ((v as u8) & 0x7F) | 0x80;
        i += 1;
        v >>= 7;
    }
    buf[i] = v as u8;
    i += 1;
    w.write_all(&buf[..i])
}

pub(crate) fn write_string(w: &mut impl Write, s: &str) -> std::io::Result<()> {
    write_var_u64(w, s.len() as u64)?;
    w.write_all(s.as_bytes())
}
