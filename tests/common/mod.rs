#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{NameType, Ssl, SslAcceptor, SslMethod};
use openssl::x509::extension::{BasicConstraints, KeyUsage, SubjectAlternativeName};
use openssl::x509::{X509NameBuilder, X509};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_openssl::SslStream;

pub struct Identity {
    pub cert: X509,
    pub key: PKey<Private>,
}

fn new_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn build_cert(cn: &str, serial: u32, key: &PKey<Private>, issuer: Option<&Identity>, ca: bool) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", cn).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    match issuer {
        Some(issuer) => builder.set_issuer_name(issuer.cert.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();

    if ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
    } else {
        let san = SubjectAlternativeName::new()
            .dns(cn)
            .build(&builder.x509v3_context(issuer.map(|i| &*i.cert), None))
            .unwrap();
        builder.append_extension(san).unwrap();
    }

    let signer = issuer.map(|i| &i.key).unwrap_or(key);
    builder.sign(signer, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// A private CA plus a leaf certificate it issued for `hostname`.
pub fn issued_by_private_ca(hostname: &str) -> (Identity, Identity) {
    let ca_key = new_key();
    let ca = Identity {
        cert: build_cert("probe test ca", 1, &ca_key, None, true),
        key: ca_key,
    };
    let leaf_key = new_key();
    let leaf = Identity {
        cert: build_cert(hostname, 2, &leaf_key, Some(&ca), false),
        key: leaf_key,
    };
    (ca, leaf)
}

pub fn self_signed(hostname: &str) -> Identity {
    let key = new_key();
    Identity {
        cert: build_cert(hostname, 7, &key, None, false),
        key,
    }
}

#[derive(Clone, Copy)]
pub enum Behaviour {
    /// Greets, accepts any login, answers QUIT.
    Accept,
    /// Greets, rejects every password.
    RejectPassword,
    /// Greets, accepts any login, answers QUIT negatively.
    RejectQuit,
}

/// What the mock server saw on one connection.
#[derive(Debug, Default)]
pub struct Session {
    pub server_name: Option<String>,
    pub handshake_ok: bool,
    pub commands: Vec<String>,
    pub closed_by_client: bool,
}

/// POP3S mock server handling connections until the test ends. Every
/// finished connection is reported on the returned channel.
pub async fn spawn_pop3s(
    identity: Identity,
    behaviour: Behaviour,
) -> (SocketAddr, mpsc::UnboundedReceiver<Session>) {
    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    builder.set_private_key(&identity.key).unwrap();
    builder.set_certificate(&identity.cert).unwrap();
    let acceptor = Arc::new(builder.build());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((tcp, _)) = listener.accept().await else {
                return;
            };
            let acceptor = acceptor.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut session = Session::default();
                let ssl = Ssl::new(acceptor.context()).unwrap();
                let mut stream = SslStream::new(ssl, tcp).unwrap();
                let accepted = Pin::new(&mut stream).accept().await;
                session.server_name = stream
                    .ssl()
                    .servername(NameType::HOST_NAME)
                    .map(str::to_string);
                if accepted.is_err() {
                    let _ = tx.send(session);
                    return;
                }
                session.handshake_ok = true;

                let (read, mut write) = tokio::io::split(stream);
                let mut lines = BufReader::new(read).lines();
                let _ = write.write_all(b"+OK mock POP3 ready\r\n").await;
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            let reply: &[u8] = match behaviour {
                                Behaviour::RejectPassword if line.starts_with("PASS") => {
                                    b"-ERR [AUTH] authentication failed\r\n"
                                }
                                Behaviour::RejectQuit if line == "QUIT" => {
                                    b"-ERR mailbox lock still held\r\n"
                                }
                                _ if line == "QUIT" => b"+OK bye\r\n",
                                _ => b"+OK\r\n",
                            };
                            session.commands.push(line);
                            let _ = write.write_all(reply).await;
                        }
                        Ok(None) => {
                            session.closed_by_client = true;
                            break;
                        }
                        Err(_) => {
                            session.closed_by_client = true;
                            break;
                        }
                    }
                }
                let _ = tx.send(session);
            });
        }
    });

    (addr, rx)
}

/// Accepts TCP connections and then never sends a byte.
pub async fn spawn_silent() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            held.push(tcp);
        }
    });
    addr
}
