//! `.vtm` multiblock collections: an index file plus one serial file per leaf.

use super::arrays::PayloadReader;
use super::reader::{read_field_data, XmlReader};
use super::tree::{parse_document, Element};
use super::writer::{DocWriter, XmlWriter};
use super::{file_type, Encoding};
use crate::data::{DataObject, MultiBlock};
use crate::{Error, Result};

use std::path::Path;

const TYPE_NAME: &str = "vtkMultiBlockDataSet";

/// Write `blocks` to `path`. Leaves go to `<stem>/<stem>_<flat index>.<ext>`
/// relative to the index file; empty slots are kept as `DataSet` elements without
/// a file.
pub fn write_multiblock(path: impl AsRef<Path>, blocks: &MultiBlock, encoding: Encoding) -> Result<()> {
    let path = path.as_ref();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::invalid_argument(format!("`{}` has no file name", path.display())))?;
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    std::fs::create_dir_all(dir.join(stem))?;

    let mut writer = LeafWriter {
        dir,
        stem,
        serial: XmlWriter::new(encoding),
        next_flat_index: 1,
        leaves: 0,
    };
    let mut doc = DocWriter::new(Encoding::Ascii);
    doc.open_file(TYPE_NAME)?;
    doc.start(TYPE_NAME, &[])?;
    doc.field_data(&blocks.field_data)?;
    writer.children(&mut doc, blocks)?;
    doc.end(TYPE_NAME)?;
    std::fs::write(path, doc.finish()?)?;
    tracing::info!(path = %path.display(), leaves = writer.leaves, "wrote multiblock file");
    Ok(())
}

struct LeafWriter<'a> {
    dir: &'a Path,
    stem: &'a str,
    serial: XmlWriter,
    next_flat_index: usize,
    leaves: usize,
}

impl LeafWriter<'_> {
    fn children(&mut self, doc: &mut DocWriter, blocks: &MultiBlock) -> Result<()> {
        for (index, block) in blocks.blocks().iter().enumerate() {
            let flat = self.next_flat_index;
            self.next_flat_index += 1;
            let mut attrs = vec![("index", index.to_string())];
            if let Some(name) = &block.name {
                attrs.push(("name", name.clone()));
            }
            match &block.data {
                Some(DataObject::MultiBlock(nested)) => {
                    doc.start("Block", &attrs)?;
                    doc.field_data(&nested.field_data)?;
                    self.children(doc, nested)?;
                    doc.end("Block")?;
                }
                Some(leaf) => {
                    let (_, ext) = file_type(leaf).ok_or_else(|| {
                        Error::invalid_argument(format!("a {} block cannot be stored in a .vtm file", leaf.type_name()))
                    })?;
                    let file = format!("{}/{}_{flat}.{ext}", self.stem, self.stem);
                    self.serial.write(self.dir.join(&file), leaf)?;
                    self.leaves += 1;
                    attrs.push(("file", file));
                    doc.empty("DataSet", &attrs)?;
                }
                None => doc.empty("DataSet", &attrs)?,
            }
        }
        Ok(())
    }
}

/// Read a `.vtm` file and the leaves it references.
pub fn read_multiblock(path: impl AsRef<Path>) -> Result<MultiBlock> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let doc = parse_document(&bytes)?;
    let type_name = doc.root.required("type")?;
    if type_name != TYPE_NAME {
        return Err(Error::file_format(format!("expected a {TYPE_NAME} file, found `{type_name}`")));
    }
    let payload = PayloadReader::new(&doc.root, doc.appended)?;
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let blocks = read_children(doc.root.expect_child(TYPE_NAME)?, dir, &payload)?;
    tracing::info!(path = %path.display(), blocks = blocks.number_of_blocks(), "read multiblock file");
    Ok(blocks)
}

fn read_children(element: &Element, dir: &Path, payload: &PayloadReader<'_>) -> Result<MultiBlock> {
    let mut blocks = MultiBlock::new();
    blocks.field_data = read_field_data(element, payload)?;
    let reader = XmlReader::new();
    let mut next = 0;
    for child in &element.children {
        let data = match child.name.as_str() {
            "Block" => Some(DataObject::MultiBlock(read_children(child, dir, payload)?)),
            "DataSet" => match child.attr("file") {
                Some(file) => Some(reader.read(dir.join(file))?),
                None => None,
            },
            _ => continue,
        };
        let index = child.parse::<usize>("index", "a block index")?.unwrap_or(next);
        next = index + 1;
        blocks.set_block(index, data);
        if let Some(name) = child.attr("name") {
            blocks.set_block_name(index, name);
        }
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ImageData, Table};
    use crate::filters::PlaneSource;
    use crate::DataArray;

    #[test]
    fn nested_blocks_and_empty_slots_survive() {
        let mut inner = MultiBlock::new();
        inner.add_block(Some("plane"), PlaneSource::default().generate().unwrap());
        inner.set_block(2, None);
        let mut table = Table::new();
        table.add_column(DataArray::scalars("count", vec![1u64, 2, 3])).unwrap();

        let mut root = MultiBlock::new();
        root.add_block(Some("image"), ImageData::with_dimensions([2, 2, 2], [0.0; 3], [1.0; 3]));
        root.add_block(Some("nested"), inner);
        root.add_block(None, table);
        root.field_data.add_array(DataArray::scalars("step", vec![3i32]));

        let dir = std::env::temp_dir().join(format!("vtk-pipeline-vtm-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("scene.vtm");
        write_multiblock(&path, &root, Encoding::Binary).unwrap();
        assert!(dir.join("scene/scene_1.vti").exists());
        assert_eq!(read_multiblock(&path).unwrap(), root);
        std::fs::remove_dir_all(dir).ok();
    }
}
