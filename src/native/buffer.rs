//! Bound buffers: contiguous fixed-stride storage lent to the driver.
//!
//! A `BoundBuffer` holds `count` elements of `width` bytes each plus a
//! parallel indicator array. Elements are addressed by index × stride and
//! their layout is given by the buffer's `CType`. Buffers are never resized
//! in place: a new element count or width means a new buffer.

use std::collections::BTreeMap;
use std::panic::Location;

use bytes::{Buf, BufMut, BytesMut};

use super::constants::SQL_NULL_DATA;
use crate::error::{Error, Result};
use crate::types::{CType, Date, FromValue, SqlType, Time, Timestamp, Value};

/// Direction of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamDirection {
    #[default]
    In,
    Out,
    InOut,
    Return,
}

impl ParamDirection {
    pub fn code(&self) -> i16 {
        use super::constants::*;
        match self {
            ParamDirection::In => SQL_PARAM_INPUT,
            ParamDirection::Out => SQL_PARAM_OUTPUT,
            ParamDirection::InOut => SQL_PARAM_INPUT_OUTPUT,
            ParamDirection::Return => SQL_RETURN_VALUE,
        }
    }

    /// Whether the driver writes into the buffer on execution.
    pub fn is_output(&self) -> bool {
        !matches!(self, ParamDirection::In)
    }
}

/// Storage for one bound column or parameter.
#[derive(Debug, Clone)]
pub struct BoundBuffer {
    ordinal: usize,
    c_type: CType,
    sql_type: SqlType,
    direction: ParamDirection,
    width: usize,
    data: BytesMut,
    indicators: Vec<i64>,
}

impl BoundBuffer {
    /// Allocate a zeroed buffer of `count` elements, each `width` bytes wide.
    pub fn new(ordinal: usize, c_type: CType, sql_type: SqlType, width: usize, count: usize) -> Self {
        let count = count.max(1);
        Self {
            ordinal,
            c_type,
            sql_type,
            direction: ParamDirection::In,
            width,
            data: BytesMut::zeroed(width * count),
            indicators: vec![SQL_NULL_DATA; count],
        }
    }

    /// Set the parameter direction.
    pub fn with_direction(mut self, direction: ParamDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn c_type(&self) -> CType {
        self.c_type
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn direction(&self) -> ParamDirection {
        self.direction
    }

    /// Byte width of one element.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of elements.
    pub fn count(&self) -> usize {
        self.indicators.len()
    }

    /// Raw bytes of element `index`.
    pub fn element(&self, index: usize) -> &[u8] {
        let start = index * self.width;
        &self.data[start..start + self.width]
    }

    /// Mutable raw bytes of element `index`.
    pub fn element_mut(&mut self, index: usize) -> &mut [u8] {
        let start = index * self.width;
        &mut self.data[start..start + self.width]
    }

    pub fn indicator(&self, index: usize) -> i64 {
        self.indicators[index]
    }

    pub fn set_indicator(&mut self, index: usize, indicator: i64) {
        self.indicators[index] = indicator;
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.indicators[index] == SQL_NULL_DATA
    }

    /// Mark element `index` as NULL.
    pub fn set_null(&mut self, index: usize) {
        self.indicators[index] = SQL_NULL_DATA;
    }

    /// Decode element `index` into a value.
    pub fn value(&self, index: usize) -> Result<Value> {
        decode_element(self.c_type, self.element(index), self.indicators[index])
    }

    /// Encode `value` into element `index`, updating its indicator.
    ///
    /// Returns `true` when character or binary data had to be truncated.
    pub fn write_value(&mut self, index: usize, value: &Value) -> Result<bool> {
        let c_type = self.c_type;
        let indicator = encode_element(c_type, value, self.element_mut(index))?;
        self.indicators[index] = indicator;
        Ok(is_truncated(c_type, indicator, self.width))
    }
}

/// Whether an indicator reports more data than fits in a `width` element.
pub fn is_truncated(c_type: CType, indicator: i64, width: usize) -> bool {
    match c_type {
        CType::Char => indicator >= 0 && indicator as usize >= width,
        CType::Binary => indicator >= 0 && indicator as usize > width,
        _ => false,
    }
}

/// Bound buffers keyed by 0-based ordinal.
#[derive(Debug, Clone, Default)]
pub struct BufferTable {
    buffers: BTreeMap<usize, BoundBuffer>,
}

impl BufferTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a buffer, replacing (and freeing) any previous one at the same ordinal.
    pub fn insert(&mut self, buffer: BoundBuffer) -> Option<BoundBuffer> {
        self.buffers.insert(buffer.ordinal, buffer)
    }

    pub fn remove(&mut self, ordinal: usize) -> Option<BoundBuffer> {
        self.buffers.remove(&ordinal)
    }

    pub fn get(&self, ordinal: usize) -> Option<&BoundBuffer> {
        self.buffers.get(&ordinal)
    }

    pub fn get_mut(&mut self, ordinal: usize) -> Option<&mut BoundBuffer> {
        self.buffers.get_mut(&ordinal)
    }

    pub fn contains(&self, ordinal: usize) -> bool {
        self.buffers.contains_key(&ordinal)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
    }

    /// Highest bound ordinal, if any.
    pub fn last_ordinal(&self) -> Option<usize> {
        self.buffers.keys().next_back().copied()
    }

    /// Smallest element count over all buffers.
    pub fn min_count(&self) -> Option<usize> {
        self.buffers.values().map(|b| b.count()).min()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundBuffer> {
        self.buffers.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BoundBuffer> {
        self.buffers.values_mut()
    }
}

/// Columns of a table-valued parameter bound under one parameter ordinal.
#[derive(Debug, Clone, Default)]
pub struct TableParameter {
    /// Number of rows in the table payload.
    pub row_count: usize,
    /// Column buffers, each holding `row_count` elements.
    pub columns: BufferTable,
}

/// All parameter buffers of a statement, as lent to the driver on execution.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    /// Scalar and array parameters.
    pub buffers: BufferTable,
    /// Table-valued parameters keyed by parameter ordinal.
    pub tables: BTreeMap<usize, TableParameter>,
}

impl ParameterSet {
    pub fn clear(&mut self) {
        self.buffers.clear();
        self.tables.clear();
    }

    pub fn is_bound(&self, ordinal: usize) -> bool {
        self.buffers.contains(ordinal) || self.tables.contains_key(&ordinal)
    }
}

/// Checked reader over one buffer element.
struct ElementReader<'a> {
    data: &'a [u8],
}

impl<'a> ElementReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    #[track_caller]
    fn need(&self, n: usize) -> Result<()> {
        if self.data.remaining() < n {
            return Err(Error::BufferTooSmall {
                needed: n,
                available: self.data.remaining(),
                location: Location::caller(),
            });
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.data.get_u8())
    }

    fn read_i8(&mut self) -> Result<i8> {
        self.need(1)?;
        Ok(self.data.get_i8())
    }

    fn read_i16(&mut self) -> Result<i16> {
        self.need(2)?;
        Ok(self.data.get_i16_ne())
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.data.get_u16_ne())
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.data.get_i32_ne())
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.data.get_u32_ne())
    }

    fn read_i64(&mut self) -> Result<i64> {
        self.need(8)?;
        Ok(self.data.get_i64_ne())
    }

    fn read_u64(&mut self) -> Result<u64> {
        self.need(8)?;
        Ok(self.data.get_u64_ne())
    }

    fn read_f32(&mut self) -> Result<f32> {
        self.need(4)?;
        Ok(self.data.get_f32_ne())
    }

    fn read_f64(&mut self) -> Result<f64> {
        self.need(8)?;
        Ok(self.data.get_f64_ne())
    }
}

/// Decode character data as UTF-8.
///
/// When the data was `cut` to fit a buffer, an incomplete trailing
/// sequence is dropped; any other invalid byte is an error.
pub fn decode_text(bytes: &[u8], cut: bool) -> Result<String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(e) if cut && e.error_len().is_none() => {
            Ok(String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned())
        }
        Err(e) => Err(Error::type_incompatible(format!(
            "character data is not valid UTF-8: {}",
            e
        ))),
    }
}

/// Decode one element of layout `c_type`.
pub fn decode_element(c_type: CType, data: &[u8], indicator: i64) -> Result<Value> {
    if indicator == SQL_NULL_DATA {
        return Ok(Value::Null);
    }
    let mut r = ElementReader::new(data);
    Ok(match c_type {
        CType::Char => {
            let limit = if indicator >= 0 {
                (indicator as usize).min(data.len())
            } else {
                data.len()
            };
            let bytes = &data[..limit];
            let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
            let cut = indicator < 0 || indicator as usize >= data.len();
            Value::Text(decode_text(&bytes[..end], cut)?)
        }
        CType::Binary => {
            let len = if indicator >= 0 {
                (indicator as usize).min(data.len())
            } else {
                data.len()
            };
            Value::Binary(data[..len].to_vec())
        }
        CType::Bit => Value::Bit(r.read_u8()? != 0),
        CType::STinyInt => Value::TinyInt(r.read_i8()?),
        CType::UTinyInt => Value::SmallInt(r.read_u8()? as i16),
        CType::SShort => Value::SmallInt(r.read_i16()?),
        CType::UShort => Value::Integer(r.read_u16()? as i32),
        CType::SLong => Value::Integer(r.read_i32()?),
        CType::ULong => Value::BigInt(r.read_u32()? as i64),
        CType::SBigInt => Value::BigInt(r.read_i64()?),
        CType::UBigInt => Value::UBigInt(r.read_u64()?),
        CType::Float => Value::Real(r.read_f32()?),
        CType::Double => Value::Double(r.read_f64()?),
        CType::Date => Value::Date(Date {
            year: r.read_i16()?,
            month: r.read_u16()?,
            day: r.read_u16()?,
        }),
        CType::Time => Value::Time(Time {
            hour: r.read_u16()?,
            minute: r.read_u16()?,
            second: r.read_u16()?,
        }),
        CType::Timestamp => Value::Timestamp(Timestamp {
            year: r.read_i16()?,
            month: r.read_u16()?,
            day: r.read_u16()?,
            hour: r.read_u16()?,
            minute: r.read_u16()?,
            second: r.read_u16()?,
            fraction: r.read_u32()?,
        }),
    })
}

#[track_caller]
fn fits(out: &[u8], n: usize) -> Result<()> {
    if out.len() < n {
        return Err(Error::BufferTooSmall {
            needed: n,
            available: out.len(),
            location: Location::caller(),
        });
    }
    Ok(())
}

/// Encode `value` into `out` using layout `c_type` and return the indicator.
///
/// Character data is null-terminated and binary data copied up to the
/// element width; in both cases the indicator carries the full length, so a
/// value longer than the element is detectable with [`is_truncated`].
pub fn encode_element(c_type: CType, value: &Value, out: &mut [u8]) -> Result<i64> {
    if value.is_null() {
        return Ok(SQL_NULL_DATA);
    }
    match c_type {
        CType::Char => {
            let text = String::from_value(value)?;
            let bytes = text.as_bytes();
            let n = bytes.len().min(out.len().saturating_sub(1));
            out[..n].copy_from_slice(&bytes[..n]);
            if n < out.len() {
                out[n] = 0;
            }
            return Ok(bytes.len() as i64);
        }
        CType::Binary => {
            let bytes = Vec::<u8>::from_value(value)?;
            let n = bytes.len().min(out.len());
            out[..n].copy_from_slice(&bytes[..n]);
            return Ok(bytes.len() as i64);
        }
        _ => {}
    }
    let width = c_type.fixed_width().unwrap_or(0);
    fits(out, width)?;
    let mut w = out;
    match c_type {
        CType::Char | CType::Binary => {}
        CType::Bit => w.put_u8(bool::from_value(value)? as u8),
        CType::STinyInt => w.put_i8(i8::from_value(value)?),
        CType::UTinyInt => w.put_u8(u8::from_value(value)?),
        CType::SShort => w.put_i16_ne(i16::from_value(value)?),
        CType::UShort => w.put_u16_ne(u16::from_value(value)?),
        CType::SLong => w.put_i32_ne(i32::from_value(value)?),
        CType::ULong => w.put_u32_ne(u32::from_value(value)?),
        CType::SBigInt => w.put_i64_ne(i64::from_value(value)?),
        CType::UBigInt => w.put_u64_ne(u64::from_value(value)?),
        CType::Float => w.put_f32_ne(f32::from_value(value)?),
        CType::Double => w.put_f64_ne(f64::from_value(value)?),
        CType::Date => {
            let d = Date::from_value(value)?;
            w.put_i16_ne(d.year);
            w.put_u16_ne(d.month);
            w.put_u16_ne(d.day);
        }
        CType::Time => {
            let t = Time::from_value(value)?;
            w.put_u16_ne(t.hour);
            w.put_u16_ne(t.minute);
            w.put_u16_ne(t.second);
        }
        CType::Timestamp => {
            let ts = Timestamp::from_value(value)?;
            w.put_i16_ne(ts.year);
            w.put_u16_ne(ts.month);
            w.put_u16_ne(ts.day);
            w.put_u16_ne(ts.hour);
            w.put_u16_ne(ts.minute);
            w.put_u16_ne(ts.second);
            w.put_u32_ne(ts.fraction);
        }
    }
    Ok(width as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_decoding_is_strict() {
        let err = decode_element(CType::Char, b"ab\xffc\0", 4).unwrap_err();
        assert!(matches!(err, Error::TypeIncompatible { .. }));

        // "é" split by a 4 byte element: the dangling lead byte is dropped
        let data = [b'a', b'b', 0xc3, 0xa9, 0xc3, 0];
        assert_eq!(decode_element(CType::Char, &data[..5], 5).unwrap(), Value::Text("abé".into()));
        assert_eq!(
            decode_element(CType::Char, &[b'x', 0xc3], 6).unwrap(),
            Value::Text("x".into())
        );
        assert!(decode_text(&[b'x', 0xc3], false).is_err());
    }

    #[test]
    fn test_fixed_stride_addressing() {
        let mut buf = BoundBuffer::new(0, CType::SLong, SqlType::Integer, 4, 3);
        for (i, v) in [10, 20, 30].iter().enumerate() {
            buf.write_value(i, &Value::Integer(*v)).unwrap();
        }
        buf.set_null(1);
        assert_eq!(buf.count(), 3);
        assert_eq!(buf.value(0).unwrap(), Value::Integer(10));
        assert_eq!(buf.value(1).unwrap(), Value::Null);
        assert_eq!(buf.value(2).unwrap(), Value::Integer(30));
    }

    #[test]
    fn test_char_truncation_reports_full_length() {
        let mut buf = BoundBuffer::new(0, CType::Char, SqlType::VarChar { size: 3 }, 4, 1);
        let truncated = buf.write_value(0, &Value::Text("abcdef".into())).unwrap();
        assert!(truncated);
        assert_eq!(buf.indicator(0), 6);
        assert_eq!(buf.value(0).unwrap(), Value::Text("abc".into()));

        let truncated = buf.write_value(0, &Value::Text("ab".into())).unwrap();
        assert!(!truncated);
        assert_eq!(buf.value(0).unwrap(), Value::Text("ab".into()));
    }

    #[test]
    fn test_binary_uses_octet_length() {
        let mut buf = BoundBuffer::new(0, CType::Binary, SqlType::VarBinary { size: 8 }, 8, 1);
        buf.write_value(0, &Value::Binary(vec![1, 2, 3])).unwrap();
        assert_eq!(buf.indicator(0), 3);
        assert_eq!(buf.value(0).unwrap(), Value::Binary(vec![1, 2, 3]));
    }

    #[test]
    fn test_timestamp_layout() {
        let ts = Timestamp {
            year: 1999,
            month: 12,
            day: 31,
            hour: 23,
            minute: 59,
            second: 58,
            fraction: 123,
        };
        let mut out = [0u8; 16];
        let ind = encode_element(CType::Timestamp, &Value::Timestamp(ts), &mut out).unwrap();
        assert_eq!(ind, 16);
        assert_eq!(
            decode_element(CType::Timestamp, &out, ind).unwrap(),
            Value::Timestamp(ts)
        );
    }

    #[test]
    fn test_short_element_is_reported() {
        let err = decode_element(CType::SBigInt, &[0u8; 4], 8).unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { needed: 8, available: 4, .. }));
        let mut out = [0u8; 2];
        assert!(encode_element(CType::SLong, &Value::Integer(1), &mut out).is_err());
    }

    #[test]
    fn test_table_replaces_by_ordinal() {
        let mut table = BufferTable::new();
        table.insert(BoundBuffer::new(1, CType::SLong, SqlType::Integer, 4, 1));
        table.insert(BoundBuffer::new(0, CType::SLong, SqlType::Integer, 4, 10));
        let old = table.insert(BoundBuffer::new(1, CType::Double, SqlType::Double, 8, 10));
        assert!(old.is_some());
        assert_eq!(table.len(), 2);
        assert_eq!(table.last_ordinal(), Some(1));
        assert_eq!(table.min_count(), Some(10));
        assert_eq!(table.get(1).unwrap().c_type(), CType::Double);
    }
}
