// omemo-xmpp/stanza
//
// License: Mozilla Public License v2.0 (MPL v2.0)
//
// `encrypted` element per spec.md §6:
//   <encrypted xmlns='eu.siacs.conversations.axolotl'>
//     <header sid='…'>
//       <key rid='…' prekey='true'?>…</key>*
//       <iv>…</iv>
//     </header>
//     <payload>…</payload>?
//   </encrypted>
//
// §9's auth-tag framing note applies one level up (the tag lives inside
// each `key`'s base64 blob, produced by `Encryptor`/`SessionEngine` before
// this codec ever sees it) — this module only moves bytes, it never
// inspects the wrapped-key contents.

use base64::{engine::general_purpose, Engine as _};
use minidom::{Element, NSChoice};

use omemo_core::models::{OmemoElement, WrappedKey};

use crate::element_ext::ElementExt;
use crate::ns;

fn omemo_ns_choice() -> NSChoice<'static> {
    NSChoice::AnyOf(&[ns::LEGACY_OMEMO, ns::OMEMO])
}

pub fn decode_omemo_element(element: &Element) -> anyhow::Result<OmemoElement> {
    element.expect_is("encrypted", omemo_ns_choice())?;

    let header = element.req_child("header", element.ns())?;
    let sender_device_id = header.req_attr("sid")?.parse::<u32>()?.into();

    let iv_el = header.req_child("iv", element.ns())?;
    let iv = general_purpose::STANDARD
        .decode(iv_el.text().trim())?
        .into_boxed_slice();

    let mut keys = Vec::new();
    for child in header.children() {
        if child.name() != "key" {
            continue;
        }
        let recipient_device_id = child.req_attr("rid")?.parse::<u32>()?.into();
        let is_pre_key = child
            .attr("prekey")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let encrypted_key = general_purpose::STANDARD
            .decode(child.text().trim())?
            .into_boxed_slice();
        keys.push(WrappedKey {
            recipient_device_id,
            is_pre_key,
            encrypted_key,
        });
    }

    let payload = element
        .get_child("payload", element.ns())
        .map(|p| -> anyhow::Result<Box<[u8]>> {
            Ok(general_purpose::STANDARD
                .decode(p.text().trim())?
                .into_boxed_slice())
        })
        .transpose()?;

    Ok(OmemoElement {
        sender_device_id,
        iv,
        keys,
        payload,
    })
}

pub fn encode_omemo_element(element: &OmemoElement) -> Element {
    let mut header = Element::builder("header", ns::LEGACY_OMEMO)
        .attr("sid", u32::from(element.sender_device_id));

    for key in &element.keys {
        let mut key_el = Element::builder("key", ns::LEGACY_OMEMO)
            .attr("rid", u32::from(key.recipient_device_id));
        if key.is_pre_key {
            key_el = key_el.attr("prekey", "true");
        }
        header = header.append(key_el.append(general_purpose::STANDARD.encode(key.encrypted_key.as_ref())).build());
    }

    header = header.append(
        Element::builder("iv", ns::LEGACY_OMEMO)
            .append(general_purpose::STANDARD.encode(element.iv.as_ref()))
            .build(),
    );

    let mut builder = Element::builder("encrypted", ns::LEGACY_OMEMO).append(header.build());

    if let Some(payload) = &element.payload {
        builder = builder.append(
            Element::builder("payload", ns::LEGACY_OMEMO)
                .append(general_purpose::STANDARD.encode(payload.as_ref()))
                .build(),
        );
    }

    builder.build()
}
