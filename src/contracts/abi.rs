use ethers::contract::abigen;
use ethers::types::U256;

abigen!(
    MarketFactory,
    r#"[
        function createMarket(string question, string imageUrl, uint256 lockTime) external returns (address market)
        function markets() external view returns (address[] list)
        function marketById(uint256 id) external view returns (address market)
        function positionToken() external view returns (address)
        event MarketCreated(uint256 indexed marketId, address indexed market, string question, uint256 lockTime)
    ]"#
);

abigen!(
    PredictionMarket,
    r#"[
        struct MarketInfo { uint256 id; string question; string imageUrl; uint256 lockTime; uint256 totalYes; uint256 totalNo; uint256 totalPool; bool resolved; uint8 outcome; }
        function placeYes() external payable
        function placeNo() external payable
        function lockMarket() external
        function resolveYes() external
        function resolveNo() external
        function claim() external
        function getInfo() external view returns (MarketInfo info)
    ]"#
);

abigen!(
    PositionToken,
    r#"[
        function balanceOf(address account, uint256 id) external view returns (uint256)
    ]"#
);

/// ERC-1155 token id of the YES position for a market.
pub fn id_yes(market_id: u64) -> U256 {
    U256::from(market_id) * U256::from(2u64) + U256::one()
}

/// ERC-1155 token id of the NO position for a market.
pub fn id_no(market_id: u64) -> U256 {
    U256::from(market_id) * U256::from(2u64) + U256::from(2u64)
}
