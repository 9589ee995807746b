// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Minimal typed view of the cert-manager `Certificate` resource.
//!
//! Only the fields the record controller manages are modelled. Everything else
//! in `.spec` is carried through untouched in [`CertificateSpec::extra`] so
//! that replacing a certificate never drops fields set by other tools.

use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[kube(
    group = "cert-manager.io",
    version = "v1",
    kind = "Certificate",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    /// Secret the issued key pair is written to
    pub secret_name: String,

    #[serde(default)]
    pub dns_names: Vec<String>,

    pub issuer_ref: IssuerReference,

    /// Fields not managed by the controller
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssuerReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}
