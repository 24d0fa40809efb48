// ==============================================================================
// pedigree.rs - Pedigree Graph Resolution
// ==============================================================================
// Description: Converts a PhenoTips family-info payload into family members
//              with resolved parents and proband
// Created: 2025-11-20
// Modified: 2025-12-04
// Version: 1.2.0
// ==============================================================================
// Payload (abridged):
//   {
//     "family":   { "familyMembers": [ { "identifier": "FAM01.03", "id": "P0000103" } ] },
//     "pedigree": {
//       "members":       [ { "id": 3, "properties": { "id": "P0000103", "sex": "F" },
//                            "pedigreeProperties": { "carrierStatus": "affected" } } ],
//       "relationships": [ { "members": [1, 2], "children": [ { "id": 3 } ] } ],
//       "proband": 3
//     }
//   }
// familyMembers only lists individuals with a PhenoTips record; the pedigree
// may contain further placeholder nodes without one.
// ==============================================================================

use serde::Deserialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::client::PhenotipsApi;
use crate::error::{PipelineError, Result};
use crate::models::{AffectedStatus, PersonRecord, Sex};

#[derive(Debug, Clone, Deserialize)]
pub struct FamilyInfo {
    pub family: Family,
    pub pedigree: PedigreeData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    #[serde(default)]
    pub family_members: Vec<FamilyMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FamilyMember {
    /// External (clinical) identifier
    #[serde(default)]
    pub identifier: Option<String>,
    /// PhenoTips patient id
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PedigreeData {
    #[serde(default)]
    pub members: Vec<PedigreeNode>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub proband: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PedigreeNode {
    pub id: i64,
    #[serde(default)]
    pub properties: Option<NodeProperties>,
    #[serde(default, rename = "pedigreeProperties")]
    pub pedigree_properties: Option<PedigreeProperties>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeProperties {
    /// PhenoTips patient id linked to this node
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PedigreeProperties {
    #[serde(default, rename = "carrierStatus")]
    pub carrier_status: Option<String>,
}

/// Parent set -> child set edge
#[derive(Debug, Clone, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub members: Vec<i64>,
    #[serde(default)]
    pub children: Vec<ChildRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChildRef {
    pub id: i64,
}

/// Family members keyed by external id, in the order PhenoTips listed them
#[derive(Debug, Clone)]
pub struct ResolvedPedigree {
    members: Vec<PersonRecord>,
    index: HashMap<String, usize>,
    proband_id: String,
}

impl ResolvedPedigree {
    pub fn members(&self) -> &[PersonRecord] {
        &self.members
    }

    pub fn get(&self, external_id: &str) -> Option<&PersonRecord> {
        self.index.get(external_id).map(|&i| &self.members[i])
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.index.contains_key(external_id)
    }

    /// External id of the proband
    pub fn proband_id(&self) -> &str {
        &self.proband_id
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Lookup tables built once per payload
struct NodeIndex<'p> {
    by_patient: HashMap<&'p str, &'p PedigreeNode>,
    parents_of: HashMap<i64, &'p [i64]>,
}

impl<'p> NodeIndex<'p> {
    fn build(pedigree: &'p PedigreeData) -> Self {
        let mut by_patient = HashMap::with_capacity(pedigree.members.len());
        for node in &pedigree.members {
            let patient = node.properties.as_ref().and_then(|p| p.id.as_deref());
            if let Some(patient) = patient {
                by_patient.entry(patient).or_insert(node);
            }
        }

        // The payload does not promise one parent edge per child; the first
        // edge listing a child wins and later ones are reported.
        let mut parents_of: HashMap<i64, &[i64]> = HashMap::new();
        for relationship in &pedigree.relationships {
            for child in &relationship.children {
                match parents_of.entry(child.id) {
                    Entry::Occupied(existing) => {
                        if *existing.get() != relationship.members.as_slice() {
                            warn!(
                                node = child.id,
                                "Pedigree node is a child in more than one relationship; keeping parents {:?}, ignoring {:?}",
                                existing.get(),
                                relationship.members
                            );
                        }
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(relationship.members.as_slice());
                    }
                }
            }
        }

        Self { by_patient, parents_of }
    }
}

/// Resolves family members, parents and proband from a family-info payload
pub struct PedigreeGraphBuilder<'a, A: PhenotipsApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: PhenotipsApi + ?Sized> PedigreeGraphBuilder<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    pub fn build(&self, info: &FamilyInfo) -> Result<ResolvedPedigree> {
        let nodes = NodeIndex::build(&info.pedigree);

        let mut members: Vec<PersonRecord> = Vec::with_capacity(info.family.family_members.len());
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut node_to_external: HashMap<i64, String> = HashMap::new();

        for member in &info.family.family_members {
            let external_id = match member.identifier.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => {
                    warn!(patient = %member.id, "Family member has no external identifier, skipping");
                    continue;
                }
            };

            let node = nodes.by_patient.get(member.id.as_str()).ok_or_else(|| {
                PipelineError::UnmatchedFamilyMember {
                    external_id: external_id.clone(),
                    patient_id: member.id.clone(),
                }
            })?;

            let sex = self.resolve_sex(node, &member.id)?;
            let affected = AffectedStatus::from_carrier_status(
                node.pedigree_properties
                    .as_ref()
                    .and_then(|p| p.carrier_status.as_deref()),
            );
            let parent_node_ids = nodes
                .parents_of
                .get(&node.id)
                .map(|parents| parents.to_vec())
                .unwrap_or_default();

            debug!(
                "Member {} ({}): node {}, {:?}, {:?}, parent nodes {:?}",
                external_id, member.id, node.id, sex, affected, parent_node_ids
            );

            node_to_external.insert(node.id, external_id.clone());
            let record = PersonRecord {
                external_id: external_id.clone(),
                patient_id: member.id.clone(),
                node_id: node.id,
                sex,
                affected,
                parent_node_ids,
                parent_external_ids: Vec::new(),
            };

            // A repeated identifier keeps its first position but takes the later record
            match index.get(&external_id) {
                Some(&i) => members[i] = record,
                None => {
                    index.insert(external_id, members.len());
                    members.push(record);
                }
            }
        }

        // Parent nodes without an external id are placeholders and are dropped
        for record in &mut members {
            record.parent_external_ids = record
                .parent_node_ids
                .iter()
                .filter_map(|node| node_to_external.get(node))
                .filter(|id| index.contains_key(id.as_str()))
                .cloned()
                .collect();
        }

        let proband_node = info.pedigree.proband;
        let proband_id = proband_node
            .and_then(|node| node_to_external.get(&node))
            .cloned()
            .ok_or(PipelineError::MissingProbandIdentifier { node: proband_node })?;

        info!("Proband in pedigree is {}", proband_id);

        Ok(ResolvedPedigree {
            members,
            index,
            proband_id,
        })
    }

    /// Sex from the pedigree node, falling back to the patient record
    fn resolve_sex(&self, node: &PedigreeNode, patient_id: &str) -> Result<Sex> {
        let recorded = node.properties.as_ref().and_then(|p| p.sex.as_deref());
        if let Some(sex) = Sex::from_phenotips(recorded) {
            return Ok(sex);
        }

        info!("Querying PhenoTips for sex of participant {}", patient_id);
        let missing = || PipelineError::MissingSexData {
            patient_id: patient_id.to_string(),
        };

        match self.api.patient_sex(patient_id) {
            Ok(value) => {
                let sex = Sex::from_phenotips(value.as_deref()).ok_or_else(missing)?;
                info!("Participant {} has sex {:?}", patient_id, sex);
                Ok(sex)
            }
            Err(e) => {
                warn!("Sex lookup for participant {} failed: {}", patient_id, e);
                Err(missing())
            }
        }
    }
}
