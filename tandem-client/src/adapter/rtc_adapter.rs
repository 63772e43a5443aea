use crate::adapter::{
    AdapterError, AdapterEvent, AdapterFactory, PeerConnectionAdapter, PeerConnectionState,
};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tandem_core::{IceCandidate, IceServerConfig, PeerId, SdpType, SessionDescription};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

const DATA_CHANNEL_LABEL: &str = "tandem";

/// webrtc-rs backed peer connection.
pub struct RtcAdapter {
    remote: PeerId,
    peer_connection: Arc<RTCPeerConnection>,
    /// Created by the offering side so the offer carries an application m-line.
    data_channel: Mutex<Option<Arc<RTCDataChannel>>>,
    closed: AtomicBool,
}

impl RtcAdapter {
    pub async fn new(
        remote: PeerId,
        ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<AdapterEvent>,
    ) -> anyhow::Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers.iter().map(to_rtc_ice_server).collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let state_tx = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                Box::pin(async move {
                    info!("Peer connection to {} is {:?}", remote, s);
                    if let Some(state) = from_rtc_state(s) {
                        let _ = tx.send(AdapterEvent::StateChanged(state));
                    }
                })
            },
        ));

        let ice_tx = events;
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                debug!("Local candidate for {}: {}", remote, init.candidate);
                let _ = tx.send(AdapterEvent::IceCandidate(IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                }));
            })
        }));

        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            Box::pin(async move {
                debug!("DataChannel '{}' opened by {}", dc.label(), remote);
            })
        }));

        Ok(Self {
            remote,
            peer_connection,
            data_channel: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), AdapterError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AdapterError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl PeerConnectionAdapter for RtcAdapter {
    async fn create_offer(&self) -> Result<SessionDescription, AdapterError> {
        self.ensure_open()?;

        let mut data_channel = self.data_channel.lock().await;
        if data_channel.is_none() {
            let dc = self
                .peer_connection
                .create_data_channel(DATA_CHANNEL_LABEL, None)
                .await
                .context("Failed to create data channel")?;
            *data_channel = Some(dc);
        }

        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("Failed to create offer")?;
        from_rtc_description(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, AdapterError> {
        self.ensure_open()?;
        if self.peer_connection.remote_description().await.is_none() {
            return Err(AdapterError::NoRemoteDescription);
        }

        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("Failed to create answer")?;
        from_rtc_description(answer)
    }

    async fn set_local_description(&self, desc: &SessionDescription) -> Result<(), AdapterError> {
        self.ensure_open()?;
        self.peer_connection
            .set_local_description(to_rtc_description(desc)?)
            .await
            .context("Failed to set local description")?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: &SessionDescription) -> Result<(), AdapterError> {
        self.ensure_open()?;
        if self.peer_connection.remote_description().await.is_some() {
            return Err(AdapterError::RemoteDescriptionAlreadySet);
        }

        self.peer_connection
            .set_remote_description(to_rtc_description(desc)?)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), AdapterError> {
        self.ensure_open()?;
        if self.peer_connection.remote_description().await.is_none() {
            return Err(AdapterError::NoRemoteDescription);
        }

        let init = RTCIceCandidateInit {
            candidate: candidate.candidate.clone(),
            sdp_mid: candidate.sdp_mid.clone(),
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: None,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn close(&self) -> Result<(), AdapterError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        info!("Closing peer connection to {}", self.remote);
        self.peer_connection
            .close()
            .await
            .context("Failed to close peer connection")?;
        Ok(())
    }
}

/// Builds an [`RtcAdapter`] per remote peer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtcAdapterFactory;

#[async_trait]
impl AdapterFactory for RtcAdapterFactory {
    async fn create(
        &self,
        remote: PeerId,
        ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<AdapterEvent>,
    ) -> Result<Arc<dyn PeerConnectionAdapter>, AdapterError> {
        let adapter = RtcAdapter::new(remote, ice_servers, events).await?;
        Ok(Arc::new(adapter))
    }
}

fn to_rtc_ice_server(server: &IceServerConfig) -> RTCIceServer {
    RTCIceServer {
        urls: server.urls.clone(),
        username: server.username.clone().unwrap_or_default(),
        credential: server.credential.clone().unwrap_or_default(),
        ..Default::default()
    }
}

fn to_rtc_description(desc: &SessionDescription) -> anyhow::Result<RTCSessionDescription> {
    let rtc = match desc.kind {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp.clone()),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp.clone()),
    };
    rtc.context("Invalid session description")
}

fn from_rtc_description(desc: RTCSessionDescription) -> Result<SessionDescription, AdapterError> {
    match desc.sdp_type {
        RTCSdpType::Offer => Ok(SessionDescription::offer(desc.sdp)),
        RTCSdpType::Answer => Ok(SessionDescription::answer(desc.sdp)),
        other => Err(anyhow!("unsupported description type {other}").into()),
    }
}

fn from_rtc_state(state: RTCPeerConnectionState) -> Option<PeerConnectionState> {
    match state {
        RTCPeerConnectionState::New => Some(PeerConnectionState::New),
        RTCPeerConnectionState::Connecting => Some(PeerConnectionState::Connecting),
        RTCPeerConnectionState::Connected => Some(PeerConnectionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(PeerConnectionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(PeerConnectionState::Failed),
        RTCPeerConnectionState::Closed => Some(PeerConnectionState::Closed),
        RTCPeerConnectionState::Unspecified => None,
    }
}
