//! Borsh decoding of program events, driven by the program's Anchor IDL.
//!
//! Both IDL generations are accepted: the legacy layout (`publicKey`,
//! `{"defined": "Name"}`, event fields inline) and the 0.30 layout (`pubkey`,
//! `{"defined": {"name": ..}}`, explicit discriminators, event bodies in
//! `types`).

use std::collections::HashMap;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::types::ProgramEvent;

pub type Discriminator = [u8; 8];

#[derive(Debug, Clone, PartialEq)]
enum IdlType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    U128,
    I128,
    F32,
    F64,
    Pubkey,
    String,
    Bytes,
    Option(Box<IdlType>),
    Vec(Box<IdlType>),
    Array(Box<IdlType>, usize),
    Defined(String),
}

#[derive(Debug, Clone)]
struct Field {
    name: String,
    ty: IdlType,
}

#[derive(Debug, Clone)]
enum VariantFields {
    Unit,
    Named(Vec<Field>),
    Tuple(Vec<IdlType>),
}

#[derive(Debug, Clone)]
struct Variant {
    name: String,
    fields: VariantFields,
}

#[derive(Debug, Clone)]
enum TypeDef {
    Struct(Vec<Field>),
    Enum(Vec<Variant>),
    Alias(IdlType),
}

#[derive(Debug, Clone)]
struct EventLayout {
    name: String,
    fields: Vec<Field>,
}

/// The event and type tables of one program IDL.
#[derive(Debug, Clone, Default)]
pub struct Idl {
    events: HashMap<Discriminator, EventLayout>,
    types: HashMap<String, TypeDef>,
}

/// `sha256("event:<Name>")[..8]`.
pub fn event_discriminator(name: &str) -> Discriminator {
    let digest = Sha256::digest(format!("event:{name}").as_bytes());
    let mut out = [0_u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

fn idl_err(reason: impl Into<String>) -> Error {
    Error::Idl {
        reason: reason.into(),
    }
}

impl Idl {
    pub fn from_json(json: &[u8]) -> Result<Self, Error> {
        let doc: Value = serde_json::from_slice(json)?;

        let mut types = HashMap::new();
        for entry in array(&doc, "types")? {
            let name = str_field(entry, "name")?;
            let ty = entry
                .get("type")
                .ok_or_else(|| idl_err(format!("type {name} has no body")))?;
            types.insert(name.to_string(), parse_type_def(name, ty)?);
        }

        let mut events = HashMap::new();
        for entry in array(&doc, "events")? {
            let name = str_field(entry, "name")?;
            let fields = match entry.get("fields") {
                Some(fields) => parse_fields(fields)?,
                None => match types.get(name) {
                    Some(TypeDef::Struct(fields)) => fields.clone(),
                    _ => return Err(idl_err(format!("event {name} has no struct layout"))),
                },
            };
            let discriminator = match entry.get("discriminator") {
                Some(d) => parse_discriminator(name, d)?,
                None => event_discriminator(name),
            };
            events.insert(
                discriminator,
                EventLayout {
                    name: name.to_string(),
                    fields,
                },
            );
        }

        Ok(Self { events, types })
    }

    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.events.values().map(|e| e.name.as_str())
    }

    /// Decodes one `Program data:` payload. Unknown discriminators are
    /// `Ok(None)`; truncated or malformed bodies are errors.
    pub fn decode_event(&self, payload: &[u8]) -> Result<Option<ProgramEvent>, Error> {
        let Some((disc, body)) = payload.split_first_chunk::<8>() else {
            return Ok(None);
        };
        let Some(layout) = self.events.get(disc) else {
            return Ok(None);
        };
        let mut reader = Reader::new(body);
        let data = self
            .read_fields(&layout.fields, &mut reader)
            .map_err(|e| idl_err(format!("decoding {}: {e}", layout.name)))?;
        Ok(Some(ProgramEvent {
            name: layout.name.clone(),
            data,
        }))
    }

    fn read_fields(&self, fields: &[Field], r: &mut Reader<'_>) -> Result<Value, Error> {
        let mut out = Map::with_capacity(fields.len());
        for field in fields {
            out.insert(snake_case(&field.name), self.read(&field.ty, r)?);
        }
        Ok(Value::Object(out))
    }

    fn read(&self, ty: &IdlType, r: &mut Reader<'_>) -> Result<Value, Error> {
        Ok(match ty {
            IdlType::Bool => Value::Bool(r.byte()? != 0),
            IdlType::U8 => Value::from(r.byte()?),
            IdlType::I8 => Value::from(i8::from_le_bytes(r.array()?)),
            IdlType::U16 => Value::from(u16::from_le_bytes(r.array()?)),
            IdlType::I16 => Value::from(i16::from_le_bytes(r.array()?)),
            IdlType::U32 => Value::from(u32::from_le_bytes(r.array()?)),
            IdlType::I32 => Value::from(i32::from_le_bytes(r.array()?)),
            IdlType::U64 => Value::from(u64::from_le_bytes(r.array()?)),
            IdlType::I64 => Value::from(i64::from_le_bytes(r.array()?)),
            IdlType::U128 => wide_unsigned(u128::from_le_bytes(r.array()?)),
            IdlType::I128 => wide_signed(i128::from_le_bytes(r.array()?)),
            IdlType::F32 => Value::from(f64::from(f32::from_le_bytes(r.array()?))),
            IdlType::F64 => Value::from(f64::from_le_bytes(r.array()?)),
            IdlType::Pubkey => {
                Value::String(solana_pubkey::Pubkey::new_from_array(r.array()?).to_string())
            }
            IdlType::String => {
                let len = r.len()?;
                let bytes = r.take(len)?;
                Value::String(
                    std::str::from_utf8(bytes)
                        .map_err(|e| idl_err(format!("string is not utf-8: {e}")))?
                        .to_string(),
                )
            }
            IdlType::Bytes => {
                let len = r.len()?;
                Value::from(r.take(len)?.to_vec())
            }
            IdlType::Option(inner) => match r.byte()? {
                0 => Value::Null,
                1 => self.read(inner, r)?,
                tag => return Err(idl_err(format!("invalid option tag {tag}"))),
            },
            IdlType::Vec(inner) => {
                let len = r.len()?;
                let mut items = Vec::with_capacity(len.min(r.remaining()));
                for _ in 0..len {
                    items.push(self.read(inner, r)?);
                }
                Value::Array(items)
            }
            IdlType::Array(inner, len) => {
                let mut items = Vec::with_capacity(*len);
                for _ in 0..*len {
                    items.push(self.read(inner, r)?);
                }
                Value::Array(items)
            }
            IdlType::Defined(name) => self.read_defined(name, r)?,
        })
    }

    fn read_defined(&self, name: &str, r: &mut Reader<'_>) -> Result<Value, Error> {
        match self.types.get(name) {
            Some(TypeDef::Struct(fields)) => self.read_fields(fields, r),
            Some(TypeDef::Alias(ty)) => self.read(ty, r),
            Some(TypeDef::Enum(variants)) => {
                let index = usize::from(r.byte()?);
                let variant = variants
                    .get(index)
                    .ok_or_else(|| idl_err(format!("{name} has no variant {index}")))?;
                let body = match &variant.fields {
                    VariantFields::Unit => return Ok(Value::String(variant.name.clone())),
                    VariantFields::Named(fields) => self.read_fields(fields, r)?,
                    VariantFields::Tuple(types) => Value::Array(
                        types
                            .iter()
                            .map(|ty| self.read(ty, r))
                            .collect::<Result<_, _>>()?,
                    ),
                };
                let mut wrapper = Map::with_capacity(1);
                wrapper.insert(variant.name.clone(), body);
                Ok(Value::Object(wrapper))
            }
            None => Err(idl_err(format!("undefined type {name}"))),
        }
    }
}

/// 128-bit values do not fit JSON integers in general; they are kept exact
/// when they fit 64 bits and approximated otherwise.
fn wide_unsigned(v: u128) -> Value {
    u64::try_from(v).map_or_else(|_| Value::from(v as f64), Value::from)
}

fn wide_signed(v: i128) -> Value {
    i64::try_from(v).map_or_else(|_| Value::from(v as f64), Value::from)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < n {
            return Err(idl_err(format!(
                "unexpected end of data: need {n} bytes at offset {}, have {}",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut out = [0_u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn byte(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    fn len(&mut self) -> Result<usize, Error> {
        let len = u32::from_le_bytes(self.array()?);
        usize::try_from(len).map_err(|_| idl_err("length overflows usize"))
    }
}

fn array<'a>(doc: &'a Value, key: &str) -> Result<&'a [Value], Error> {
    match doc.get(key) {
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(idl_err(format!("`{key}` is not a list"))),
        None => Ok(&[]),
    }
}

fn str_field<'a>(entry: &'a Value, key: &str) -> Result<&'a str, Error> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| idl_err(format!("entry missing `{key}`: {entry}")))
}

fn parse_discriminator(name: &str, value: &Value) -> Result<Discriminator, Error> {
    let bytes: Vec<u8> = value
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|b| b.as_u64().and_then(|n| u8::try_from(n).ok()))
                .collect()
        })
        .unwrap_or_default();
    bytes
        .try_into()
        .map_err(|_| idl_err(format!("event {name} has a malformed discriminator")))
}

fn parse_type_def(name: &str, ty: &Value) -> Result<TypeDef, Error> {
    match ty.get("kind").and_then(Value::as_str) {
        Some("struct") => Ok(TypeDef::Struct(
            ty.get("fields").map(parse_fields).transpose()?.unwrap_or_default(),
        )),
        Some("enum") => {
            let variants = array(ty, "variants")?
                .iter()
                .map(parse_variant)
                .collect::<Result<_, _>>()?;
            Ok(TypeDef::Enum(variants))
        }
        Some("type" | "alias") => {
            let alias = ty
                .get("alias")
                .or_else(|| ty.get("value"))
                .ok_or_else(|| idl_err(format!("alias {name} has no target")))?;
            Ok(TypeDef::Alias(parse_type(alias)?))
        }
        other => Err(idl_err(format!("type {name} has unsupported kind {other:?}"))),
    }
}

fn parse_variant(v: &Value) -> Result<Variant, Error> {
    let name = str_field(v, "name")?.to_string();
    let fields = match v.get("fields").and_then(Value::as_array) {
        None => VariantFields::Unit,
        Some(items) if items.is_empty() => VariantFields::Unit,
        Some(items) if items.iter().all(|f| f.get("name").is_some()) => {
            VariantFields::Named(parse_fields(&Value::Array(items.clone()))?)
        }
        Some(items) => VariantFields::Tuple(items.iter().map(parse_type).collect::<Result<_, _>>()?),
    };
    Ok(Variant { name, fields })
}

fn parse_fields(fields: &Value) -> Result<Vec<Field>, Error> {
    fields
        .as_array()
        .ok_or_else(|| idl_err(format!("fields is not a list: {fields}")))?
        .iter()
        .map(|f| {
            Ok(Field {
                name: str_field(f, "name")?.to_string(),
                ty: parse_type(
                    f.get("type")
                        .ok_or_else(|| idl_err(format!("field has no type: {f}")))?,
                )?,
            })
        })
        .collect()
}

fn parse_type(ty: &Value) -> Result<IdlType, Error> {
    if let Some(name) = ty.as_str() {
        return Ok(match name {
            "bool" => IdlType::Bool,
            "u8" => IdlType::U8,
            "i8" => IdlType::I8,
            "u16" => IdlType::U16,
            "i16" => IdlType::I16,
            "u32" => IdlType::U32,
            "i32" => IdlType::I32,
            "u64" => IdlType::U64,
            "i64" => IdlType::I64,
            "u128" => IdlType::U128,
            "i128" => IdlType::I128,
            "f32" => IdlType::F32,
            "f64" => IdlType::F64,
            "publicKey" | "pubkey" => IdlType::Pubkey,
            "string" => IdlType::String,
            "bytes" => IdlType::Bytes,
            other => return Err(idl_err(format!("unsupported primitive {other}"))),
        });
    }

    let obj = ty
        .as_object()
        .ok_or_else(|| idl_err(format!("unsupported type {ty}")))?;
    if let Some(inner) = obj.get("option").or_else(|| obj.get("coption")) {
        return Ok(IdlType::Option(Box::new(parse_type(inner)?)));
    }
    if let Some(inner) = obj.get("vec") {
        return Ok(IdlType::Vec(Box::new(parse_type(inner)?)));
    }
    if let Some(Value::Array(pair)) = obj.get("array")
        && let [inner, len] = pair.as_slice()
    {
        let len = len
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| idl_err(format!("array length must be a literal: {len}")))?;
        return Ok(IdlType::Array(Box::new(parse_type(inner)?), len));
    }
    match obj.get("defined") {
        Some(Value::String(name)) => Ok(IdlType::Defined(name.clone())),
        Some(Value::Object(d)) => d
            .get("name")
            .and_then(Value::as_str)
            .map(|n| IdlType::Defined(n.to_string()))
            .ok_or_else(|| idl_err(format!("defined type has no name: {ty}"))),
        _ => Err(idl_err(format!("unsupported type {ty}"))),
    }
}

/// `userIfFactor` -> `user_if_factor`; already snake_case names pass through.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
