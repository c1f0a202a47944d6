//! Writer for FlatBuffers tables.
//!
//! Tables are laid out front to back: the root offset, then each table's
//! vtable followed by its inline fields, then the out-of-line data it refers
//! to. Every offset therefore points forward, which is what [`Table`] expects.
//!
//! [`Table`]: crate::codec::table::Table

#[derive(Debug, Clone)]
enum Field {
    /// Little-endian scalar bytes; the width doubles as the alignment.
    Scalar(Vec<u8>),
    /// A vector of scalars: raw element bytes, element count and width.
    Vector {
        data: Vec<u8>,
        count: usize,
        elem_size: usize,
    },
    String(String),
    Table(TableBuilder),
    Tables(Vec<TableBuilder>),
}

/// Builds one table and, recursively, everything it references.
#[derive(Debug, Clone, Default)]
pub struct TableBuilder {
    fields: Vec<(u16, Field)>,
}

fn align_to(buf: &mut Vec<u8>, align: usize) {
    while buf.len() % align != 0 {
        buf.push(0);
    }
}

fn patch_u32(buf: &mut [u8], pos: usize, value: u32) {
    buf[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, slot: u16, field: Field) -> Self {
        self.fields.retain(|(s, _)| *s != slot);
        self.fields.push((slot, field));
        self
    }

    pub fn add_u8(self, slot: u16, value: u8) -> Self {
        self.push(slot, Field::Scalar(vec![value]))
    }

    pub fn add_bool(self, slot: u16, value: bool) -> Self {
        self.add_u8(slot, u8::from(value))
    }

    pub fn add_u16(self, slot: u16, value: u16) -> Self {
        self.push(slot, Field::Scalar(value.to_le_bytes().to_vec()))
    }

    pub fn add_i32(self, slot: u16, value: i32) -> Self {
        self.push(slot, Field::Scalar(value.to_le_bytes().to_vec()))
    }

    pub fn add_u64(self, slot: u16, value: u64) -> Self {
        self.push(slot, Field::Scalar(value.to_le_bytes().to_vec()))
    }

    pub fn add_str(self, slot: u16, value: &str) -> Self {
        self.push(slot, Field::String(value.to_string()))
    }

    pub fn add_bytes(self, slot: u16, value: &[u8]) -> Self {
        self.push(
            slot,
            Field::Vector {
                data: value.to_vec(),
                count: value.len(),
                elem_size: 1,
            },
        )
    }

    pub fn add_f64_vec(self, slot: u16, values: &[f64]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(
            slot,
            Field::Vector {
                data,
                count: values.len(),
                elem_size: 8,
            },
        )
    }

    pub fn add_u32_vec(self, slot: u16, values: &[u32]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(
            slot,
            Field::Vector {
                data,
                count: values.len(),
                elem_size: 4,
            },
        )
    }

    pub fn add_u64_vec(self, slot: u16, values: &[u64]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(
            slot,
            Field::Vector {
                data,
                count: values.len(),
                elem_size: 8,
            },
        )
    }

    pub fn add_table(self, slot: u16, table: TableBuilder) -> Self {
        self.push(slot, Field::Table(table))
    }

    pub fn add_tables(self, slot: u16, tables: Vec<TableBuilder>) -> Self {
        self.push(slot, Field::Tables(tables))
    }

    /// Encode as a complete buffer: a root offset followed by this table.
    pub fn finish(self) -> Vec<u8> {
        let mut buf = vec![0u8; 4];
        let root = self.write(&mut buf);
        patch_u32(&mut buf, 0, root as u32);
        buf
    }

    /// Append this table to `buf` and return the table's position.
    fn write(&self, buf: &mut Vec<u8>) -> usize {
        let mut fields: Vec<&(u16, Field)> = self.fields.iter().collect();
        fields.sort_by_key(|(slot, _)| *slot);
        let slot_count = fields.last().map(|(slot, _)| usize::from(*slot) + 1).unwrap_or(0);
        let vtable_len = 4 + 2 * slot_count;

        align_to(buf, 2);
        let vtable_pos = buf.len();
        buf.resize(vtable_pos + vtable_len, 0);
        align_to(buf, 4);
        let table_pos = buf.len();
        buf.extend_from_slice(&((table_pos - vtable_pos) as i32).to_le_bytes());

        // Inline part: scalars in place, u32 placeholders for references.
        let mut pending = Vec::new();
        for (slot, field) in &fields {
            let width = match field {
                Field::Scalar(bytes) => bytes.len(),
                _ => 4,
            };
            align_to(buf, width);
            let pos = buf.len();
            match field {
                Field::Scalar(bytes) => buf.extend_from_slice(bytes),
                other => {
                    buf.extend_from_slice(&[0; 4]);
                    pending.push((pos, other));
                }
            }
            let entry = vtable_pos + 4 + 2 * usize::from(*slot);
            let offset = (pos - table_pos) as u16;
            buf[entry..entry + 2].copy_from_slice(&offset.to_le_bytes());
        }
        let table_len = (buf.len() - table_pos) as u16;
        buf[vtable_pos..vtable_pos + 2].copy_from_slice(&(vtable_len as u16).to_le_bytes());
        buf[vtable_pos + 2..vtable_pos + 4].copy_from_slice(&table_len.to_le_bytes());

        for (field_pos, field) in pending {
            let target = match field {
                Field::Scalar(_) => continue,
                Field::Vector {
                    data,
                    count,
                    elem_size,
                } => {
                    // element data aligned to its width, count just before it
                    while (buf.len() + 4) % (*elem_size).max(4) != 0 {
                        buf.push(0);
                    }
                    let pos = buf.len();
                    buf.extend_from_slice(&(*count as u32).to_le_bytes());
                    buf.extend_from_slice(data);
                    pos
                }
                Field::String(s) => {
                    align_to(buf, 4);
                    let pos = buf.len();
                    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
                    buf.extend_from_slice(s.as_bytes());
                    buf.push(0);
                    pos
                }
                Field::Table(child) => child.write(buf),
                Field::Tables(children) => {
                    align_to(buf, 4);
                    let pos = buf.len();
                    buf.extend_from_slice(&(children.len() as u32).to_le_bytes());
                    let slots = buf.len();
                    buf.resize(slots + 4 * children.len(), 0);
                    for (i, child) in children.iter().enumerate() {
                        let child_pos = child.write(buf);
                        let slot_pos = slots + 4 * i;
                        patch_u32(buf, slot_pos, (child_pos - slot_pos) as u32);
                    }
                    pos
                }
            };
            patch_u32(buf, field_pos, (target - field_pos) as u32);
        }
        table_pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::table::Table;

    #[test]
    fn test_empty_table() {
        let buf = TableBuilder::new().finish();
        let table = Table::root(&buf).unwrap();
        assert_eq!(table.get_u8(0, 3).unwrap(), 3);
    }

    #[test]
    fn test_later_add_replaces_slot() {
        let buf = TableBuilder::new().add_u16(1, 5).add_u16(1, 9).finish();
        let table = Table::root(&buf).unwrap();
        assert_eq!(table.get_u16(1, 0).unwrap(), 9);
    }

    #[test]
    fn test_vectors_are_aligned() {
        let buf = TableBuilder::new()
            .add_u8(0, 1)
            .add_f64_vec(1, &[0.25])
            .add_u32_vec(2, &[3, 4])
            .finish();
        let table = Table::root(&buf).unwrap();
        assert_eq!(table.get_f64_vec(1).unwrap(), Some(vec![0.25]));
        assert_eq!(table.get_u32_vec(2).unwrap(), Some(vec![3, 4]));

        let tail = 0.25f64.to_le_bytes();
        let pos = buf.windows(8).position(|w| w == tail).unwrap();
        assert_eq!(pos % 8, 0);
    }
}
