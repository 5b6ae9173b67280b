//! Mirror 병합 계획.
//!
//! 원격 전체 집합에서 (1) 키 필드별 유지 값 목록과 (2) 없을 때만 추가할
//! 레코드를 만듭니다. 기존 레코드는 덮어쓰지 않습니다.

use report_core::{normalize, CollectionDescriptor, CollectionKind, KeyLists, Record};
use serde_json::{Map, Value};

/// 한 컬렉션의 mirror 병합 계획.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorPlan {
    /// 삭제 기준: 키 필드 → 원격에 존재하는 값
    pub keep: KeyLists,
    /// 없을 때만 추가할 레코드
    pub records: Vec<Record>,
}

impl MirrorPlan {
    /// 원격 응답으로 계획을 만듭니다.
    ///
    /// 응답이 비어 있거나 mirror 컬렉션이 아니면 `None` (로컬 데이터 유지).
    pub fn build(descriptor: &CollectionDescriptor, items: Vec<Value>) -> Option<Self> {
        if items.is_empty() {
            return None;
        }

        match descriptor.kind {
            CollectionKind::UpdatableArrayOfScalars => {
                let field = descriptor.key_field()?;
                let records = items
                    .iter()
                    .map(|item| {
                        let mut record = Map::new();
                        record.insert(field.to_string(), item.clone());
                        record
                    })
                    .collect();

                let mut keep = KeyLists::new();
                keep.insert(field.to_string(), items);
                Some(Self { keep, records })
            }
            CollectionKind::UpdatableArrayOfObjects => {
                let keep = descriptor
                    .key_fields
                    .iter()
                    .map(|field| {
                        let values = items
                            .iter()
                            .map(|item| item.get(field).cloned().unwrap_or(Value::Null))
                            .collect();
                        (field.clone(), values)
                    })
                    .collect();

                Some(Self {
                    keep,
                    records: normalize(items, &descriptor.model),
                })
            }
            CollectionKind::InsertableArrayOfObjects => None,
        }
    }
}
